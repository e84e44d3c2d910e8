//! System-wide uninstallation command for herakles-leak-guard.
//!
//! This module implements the `uninstall` subcommand which removes:
//! - systemd service (stop, disable, remove unit file)
//! - Installed binary from /opt/herakles/bin
//! - Configuration file from /etc/herakles
//! - Note: the event log is kept as an audit trail

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use super::{is_root, INSTALLED_BINARY, INSTALLED_CONFIG, SERVICE_NAME, UNIT_PATH};
use crate::config::DEFAULT_EVENT_LOG;

/// Main uninstallation command handler
pub fn command_uninstall(skip_confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🗑️  Herakles Leak Guard - System Uninstallation");
    println!("==============================================\n");

    if !is_root() {
        eprintln!("❌ Uninstallation requires root privileges");
        eprintln!("   Run with: sudo herakles-leak-guard uninstall");
        std::process::exit(1);
    }

    if !Path::new(INSTALLED_BINARY).exists() && !Path::new(UNIT_PATH).exists() {
        eprintln!("⚠️  Herakles Leak Guard does not appear to be installed.");
        eprintln!("   Binary not found at: {}", INSTALLED_BINARY);
        std::process::exit(1);
    }

    if !skip_confirm {
        println!("⚠️  This will remove:");
        println!("   • systemd service (stopped and disabled)");
        println!("   • Binary: {}", INSTALLED_BINARY);
        println!("   • Configuration: {}", INSTALLED_CONFIG);
        println!("\n   Note: {} is kept", DEFAULT_EVENT_LOG);
        println!("\nAre you sure you want to continue? (yes/no): ");

        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input != "yes" && input != "y" {
            println!("❌ Uninstallation cancelled.");
            std::process::exit(0);
        }
    }

    println!("\n🚀 Starting uninstallation...\n");

    if Path::new(UNIT_PATH).exists() {
        println!("🛑 Stopping systemd service...");
        systemctl_ignore_errors("stop", "Service stopped", "Failed to stop service (may not be running)");

        println!("❌ Disabling systemd service...");
        systemctl_ignore_errors("disable", "Service disabled", "Failed to disable service");

        println!("🗑️  Removing systemd service file...");
        remove_file_if_exists(UNIT_PATH)?;

        println!("🔄 Reloading systemd...");
        Command::new("systemctl").arg("daemon-reload").status()?;
    } else {
        println!("ℹ️  systemd service not found, skipping service removal");
    }

    println!("🗑️  Removing binary...");
    remove_file_if_exists(INSTALLED_BINARY)?;

    println!("🗑️  Removing configuration...");
    remove_file_if_exists(INSTALLED_CONFIG)?;

    // Shared with other herakles tools; only removed when empty
    for dir in ["/opt/herakles/bin", "/opt/herakles", "/etc/herakles"] {
        if fs::remove_dir(dir).is_ok() {
            println!("   ✅ Removed empty {}", dir);
        }
    }

    println!("\n✅ Uninstallation complete!");
    Ok(())
}

fn systemctl_ignore_errors(action: &str, ok_msg: &str, fail_msg: &str) {
    match Command::new("systemctl").args([action, SERVICE_NAME]).status() {
        Ok(status) if status.success() => println!("   ✅ {}", ok_msg),
        _ => println!("   ⚠️  {}", fail_msg),
    }
}

fn remove_file_if_exists(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::remove_file(path) {
        Ok(()) => {
            println!("   ✅ Removed {}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            println!("   ℹ️  {} not found, skipping", path);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
