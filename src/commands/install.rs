//! System-wide installation command for herakles-leak-guard.
//!
//! This module implements the `install` subcommand which sets up:
//! - Binary installation to /opt/herakles/bin
//! - Default commented configuration at /etc/herakles/leak-guard.yaml
//! - systemd service running as root
//! - Automatic service enablement and start

use crate::config::{render_config, Config};
use crate::cli::ConfigFormat;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use super::config::add_config_comments;
use super::{is_root, INSTALLED_BINARY, INSTALLED_CONFIG, SERVICE_NAME, UNIT_PATH};

/// systemd service unit for herakles-leak-guard.
///
/// Runs as root so processes of every user can be signalled. The OOM score is
/// lowered so the kernel does not pick the guard itself under pressure.
const SYSTEMD_UNIT: &str = r#"[Unit]
Description=Herakles Leak Guard - memory leak killer
After=local-fs.target
Wants=docker.service

[Service]
Type=simple
User=root
Group=root
ExecStart=/opt/herakles/bin/herakles-leak-guard --config /etc/herakles/leak-guard.yaml
OOMScoreAdjust=-900
Nice=-5
KillSignal=SIGTERM
TimeoutStopSec=20

Restart=on-failure
RestartSec=3

[Install]
WantedBy=multi-user.target
"#;

/// Main installation command handler
pub fn command_install(no_service: bool, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Herakles Leak Guard - System Installation");
    println!("============================================\n");

    if !is_root() {
        eprintln!("❌ Installation requires root privileges");
        eprintln!("   Run with: sudo herakles-leak-guard install");
        std::process::exit(1);
    }

    if !force && Path::new(INSTALLED_BINARY).exists() {
        eprintln!("⚠️  Herakles Leak Guard already installed. Use --force to reinstall.");
        std::process::exit(1);
    }

    println!("📁 Creating directory structure...");
    create_directories()?;

    println!("📦 Installing binary...");
    install_binary()?;

    println!("⚙️  Generating default configuration...");
    generate_default_config(force)?;

    if !no_service {
        println!("🔧 Installing systemd service...");
        fs::write(UNIT_PATH, SYSTEMD_UNIT)?;
        println!("   ✅ systemd unit installed");

        println!("🔄 Reloading systemd...");
        systemctl(&["daemon-reload"])?;

        println!("✅ Enabling service...");
        systemctl(&["enable", SERVICE_NAME])?;

        println!("🚀 Starting service...");
        systemctl(&["restart", SERVICE_NAME])?;
    }

    println!("\n✅ Installation complete!");
    println!("\nNext steps:");
    println!("  • Check status: systemctl status {}", SERVICE_NAME);
    println!("  • View logs:    journalctl -u {} -f", SERVICE_NAME);
    println!("  • Kill history: tail -f {}", crate::config::DEFAULT_EVENT_LOG);

    Ok(())
}

fn create_directories() -> Result<(), Box<dyn std::error::Error>> {
    for dir in ["/opt/herakles/bin", "/etc/herakles"] {
        fs::create_dir_all(dir)?;
        set_permissions(dir, 0o755)?;
    }
    println!("   ✅ Directory structure created");
    Ok(())
}

fn install_binary() -> Result<(), Box<dyn std::error::Error>> {
    let current_exe = env::current_exe()?;
    // Copying onto the running binary fails with ETXTBSY; replace via rename
    let staging = format!("{}.new", INSTALLED_BINARY);
    fs::copy(&current_exe, &staging)?;
    set_permissions(&staging, 0o755)?;
    fs::rename(&staging, INSTALLED_BINARY)?;

    println!("   ✅ Binary installed to {}", INSTALLED_BINARY);
    Ok(())
}

/// An existing config is kept unless `force` is set.
fn generate_default_config(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if Path::new(INSTALLED_CONFIG).exists() && !force {
        println!("   ℹ️  Keeping existing {}", INSTALLED_CONFIG);
        return Ok(());
    }
    let yaml = add_config_comments(render_config(&Config::default(), &ConfigFormat::Yaml)?);
    fs::write(INSTALLED_CONFIG, yaml)?;
    set_permissions(INSTALLED_CONFIG, 0o644)?;

    println!("   ✅ Config written to {}", INSTALLED_CONFIG);
    Ok(())
}

fn systemctl(args: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    let status = Command::new("systemctl").args(args).status()?;
    if !status.success() {
        return Err(format!("systemctl {} failed with {}", args.join(" "), status).into());
    }
    Ok(())
}

/// Set file permissions using Unix mode
fn set_permissions(path: &str, mode: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(mode);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemd_unit_format() {
        assert!(SYSTEMD_UNIT.contains("[Unit]"));
        assert!(SYSTEMD_UNIT.contains("[Service]"));
        assert!(SYSTEMD_UNIT.contains("[Install]"));
        assert!(SYSTEMD_UNIT.contains("User=root"));
        assert!(SYSTEMD_UNIT.contains(INSTALLED_BINARY));
        assert!(SYSTEMD_UNIT.contains(INSTALLED_CONFIG));
        assert!(SYSTEMD_UNIT.contains("OOMScoreAdjust=-900"));
    }

    #[test]
    fn test_unit_stop_timeout_covers_kill_grace() {
        // Container stop may take up to 15 s inside the last cycle
        let timeout: u64 = SYSTEMD_UNIT
            .lines()
            .find_map(|l| l.strip_prefix("TimeoutStopSec="))
            .and_then(|v| v.parse().ok())
            .expect("TimeoutStopSec present");
        assert!(timeout >= 15);
    }
}
