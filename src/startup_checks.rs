//! Startup requirement validation for herakles-leak-guard.
//!
//! Validates that the guard can read process memory and signal other users'
//! processes before the detection loop starts.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::docker::DockerCli;
use crate::exec::command_exists;

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path, containers: bool) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(proc_root)?;

    if containers {
        check_docker();
    }

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Non-root is allowed, but only the caller's own processes can be stopped.
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - only processes of the current user can be terminated");
        warn!("   Recommendation: run as root (the installed systemd unit does)");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    let meminfo = proc_root.join("meminfo");
    if let Err(e) = fs::metadata(&meminfo) {
        error!("❌ Cannot read {}: {}", meminfo.display(), e);
        return Err(ValidationError::ProcUnavailable(format!("{}: {}", meminfo.display(), e)));
    }

    // PID 1 stat is world readable; a failure means /proc is mounted hidepid or missing
    let init_stat = proc_root.join("1").join("stat");
    match fs::metadata(&init_stat) {
        Ok(_) => {
            info!("✅ /proc access: process table readable");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot read {} - insufficient permissions", init_stat.display());
            error!("   Solutions:");
            error!("   1. Run as root");
            error!("   2. Grant capabilities:");
            error!("      setcap cap_dac_read_search,cap_kill+ep /path/to/binary");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            warn!("⚠️  Could not test /proc access: {}", e);
            Ok(())
        }
    }
}

/// Missing docker is not fatal: container monitoring disables itself on first poll.
fn check_docker() {
    if command_exists("docker") {
        match DockerCli::default().stats() {
            Ok(c) => info!("✅ Docker available ({} running containers)", c.len()),
            Err(e) => warn!("⚠️  Docker present but stats failed: {}", e),
        }
    } else {
        warn!("⚠️  docker binary not found - container monitoring will be disabled");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("/proc is not available: {0}")]
    ProcUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_meminfo_fails() {
        let dir = TempDir::new().expect("tempdir");
        let err = validate_requirements(dir.path(), false).expect_err("no meminfo");
        assert!(matches!(err, ValidationError::ProcUnavailable(_)));
    }

    #[test]
    fn test_fake_proc_passes() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("meminfo"), "MemTotal: 1000 kB\n").expect("meminfo");
        fs::create_dir(dir.path().join("1")).expect("pid dir");
        fs::write(dir.path().join("1").join("stat"), "1 (init) S 0").expect("stat");
        assert!(validate_requirements(dir.path(), false).is_ok());
    }
}
