//! CLI command implementations for herakles-leak-guard.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `install`: System-wide installation
//! - `uninstall`: System-wide uninstallation
//! - `start` / `stop`: systemd service control

pub mod check;
pub mod config;
pub mod install;
pub mod service;
pub mod uninstall;

pub use check::command_check;
pub use config::command_config;
pub use install::command_install;
pub use service::{command_start, command_stop};
pub use uninstall::command_uninstall;

pub const SERVICE_NAME: &str = "herakles-leak-guard.service";
pub const INSTALLED_BINARY: &str = "/opt/herakles/bin/herakles-leak-guard";
pub const INSTALLED_CONFIG: &str = "/etc/herakles/leak-guard.yaml";
pub const UNIT_PATH: &str = "/etc/systemd/system/herakles-leak-guard.service";

/// Check if the current process is running as root
pub(crate) fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}
