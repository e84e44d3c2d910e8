//! Telemetry gathered from procfs and the docker CLI.

use herakles_leak_guard::{ContainerSnapshot, ProcessSnapshot, SystemUsage, TelemetryError, TelemetrySource};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use crate::docker::DockerCli;
use crate::process::scan_processes;
use crate::system::read_system_usage;

pub struct LinuxTelemetry {
    proc_root: PathBuf,
    boot_time: u64,
    self_pid: u32,
    docker: DockerCli,
}

impl LinuxTelemetry {
    pub fn new(proc_root: PathBuf, boot_time: u64, docker: DockerCli) -> Self {
        Self {
            proc_root,
            boot_time,
            self_pid: std::process::id(),
            docker,
        }
    }
}

impl TelemetrySource for LinuxTelemetry {
    fn processes(&mut self) -> Result<Vec<ProcessSnapshot>, TelemetryError> {
        if !self.proc_root.is_dir() {
            return Err(TelemetryError::Failed(format!(
                "{} is not readable",
                self.proc_root.display()
            )));
        }
        let started = Instant::now();
        let procs = scan_processes(&self.proc_root, self.boot_time, self.self_pid);
        debug!("Scanned {} processes in {:?}", procs.len(), started.elapsed());
        Ok(procs)
    }

    fn containers(&mut self) -> Result<Vec<ContainerSnapshot>, TelemetryError> {
        self.docker.stats()
    }

    fn system_usage(&mut self) -> Result<SystemUsage, TelemetryError> {
        read_system_usage(&self.proc_root).map_err(TelemetryError::Failed)
    }
}
