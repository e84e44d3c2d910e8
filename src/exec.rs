//! Running external commands with a hard timeout.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs `program args...`, capturing output, and kills it after `timeout`.
///
/// A missing binary surfaces as `io::ErrorKind::NotFound`, a timeout as
/// `io::ErrorKind::TimedOut`.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> io::Result<Output> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let pid = Pid::from_raw(child.id() as i32);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            let _ = kill(pid, Signal::SIGKILL);
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} timed out after {}s", program, timeout.as_secs()),
            ))
        }
    }
}

/// True if `program` can be spawned at all.
pub fn command_exists(program: &str) -> bool {
    match run_with_timeout(program, &["--version"], Duration::from_secs(5)) {
        Ok(_) => true,
        Err(e) => e.kind() != io::ErrorKind::NotFound,
    }
}
