//! Two-phase termination of processes and containers.
//!
//! Processes get SIGTERM, up to five seconds to exit, then SIGKILL. Before the
//! first signal the start time in /proc is compared with the snapshot so a
//! recycled pid is never signalled.

use herakles_leak_guard::{ProcessSnapshot, Target, TerminateError, Terminator};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::docker::DockerCli;
use crate::process::read_stat;

/// Start times closer than this are the same process.
const START_TIME_TOLERANCE_SECS: f64 = 1.0;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct LinuxTerminator {
    proc_root: PathBuf,
    boot_time: u64,
    grace: Duration,
    docker: DockerCli,
}

impl LinuxTerminator {
    pub fn new(proc_root: PathBuf, boot_time: u64, docker: DockerCli) -> Self {
        Self {
            proc_root,
            boot_time,
            grace: Duration::from_secs(5),
            docker,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// True while the pid still refers to the snapshot's process and is not a zombie.
    fn is_same_and_alive(&self, proc: &ProcessSnapshot) -> bool {
        match read_stat(&self.proc_root.join(proc.pid.to_string())) {
            Ok(f) => {
                f.state != 'Z'
                    && (f.start_time(self.boot_time) - proc.start_time).abs() < START_TIME_TOLERANCE_SECS
            }
            Err(_) => false,
        }
    }

    fn terminate_process(&self, proc: &ProcessSnapshot) -> Result<(), TerminateError> {
        if !self.is_same_and_alive(proc) {
            return Err(TerminateError::Vanished);
        }
        let pid = Pid::from_raw(proc.pid as i32);

        send(pid, Signal::SIGTERM)?;

        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            if !self.is_same_and_alive(proc) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }

        debug!("PID {} ignored SIGTERM for {:?}, sending SIGKILL", proc.pid, self.grace);
        match send(pid, Signal::SIGKILL) {
            // Exited between the last poll and SIGKILL
            Err(TerminateError::Vanished) => Ok(()),
            other => other,
        }
    }
}

fn send(pid: Pid, signal: Signal) -> Result<(), TerminateError> {
    match kill(pid, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(TerminateError::Vanished),
        Err(Errno::EPERM) => Err(TerminateError::Denied(format!("{} to pid {}: permission denied", signal, pid))),
        Err(e) => Err(TerminateError::Failed(format!("{} to pid {}: {}", signal, pid, e))),
    }
}

impl Terminator for LinuxTerminator {
    fn terminate(&mut self, target: &Target) -> Result<(), TerminateError> {
        match target {
            Target::Process(p) => self.terminate_process(p),
            Target::Container(c) => self.docker.stop(&c.id),
        }
    }
}
