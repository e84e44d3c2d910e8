//! `start` and `stop` subcommands: thin wrappers around systemctl.

use std::path::Path;
use std::process::Command;

use super::{is_root, SERVICE_NAME, UNIT_PATH};

pub fn command_start() -> Result<(), Box<dyn std::error::Error>> {
    systemctl("start")?;
    println!("🚀 {} started", SERVICE_NAME);
    println!("   View logs: journalctl -u {} -f", SERVICE_NAME);
    Ok(())
}

pub fn command_stop() -> Result<(), Box<dyn std::error::Error>> {
    systemctl("stop")?;
    println!("🛑 {} stopped", SERVICE_NAME);
    Ok(())
}

fn systemctl(action: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !is_root() {
        return Err(format!("{} requires root privileges (sudo herakles-leak-guard {})", action, action).into());
    }
    if !Path::new(UNIT_PATH).exists() {
        return Err(format!("{} not found - run `herakles-leak-guard install` first", UNIT_PATH).into());
    }

    let status = Command::new("systemctl").args([action, SERVICE_NAME]).status()?;
    if !status.success() {
        return Err(format!("systemctl {} {} failed with {}", action, SERVICE_NAME, status).into());
    }
    Ok(())
}
