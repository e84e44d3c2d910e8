//! CLI arguments and subcommands for herakles-leak-guard.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all detector knobs, config handling flags, and daemon subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-leak-guard",
    about = "Kill persistent memory leakers and relieve RAM pressure",
    long_about = "Kill persistent memory leakers and relieve RAM pressure.\n\n\
                  A process (or container) is considered a leak when its RSS fits an upward line \
                  whose slope exceeds --slope MB/min and whose net growth exceeds --growth MB within \
                  a sliding window of --history samples, in --conf consecutive windows. When total \
                  RAM exceeds --high %, the most suspicious processes are terminated until usage \
                  falls to --low %.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Protection mode (default) only kills leaks when RAM >= --leak-threshold %. \
                  Hunting mode kills every confirmed leak. More info: https://www.herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Sampling interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Number of samples in the regression window
    #[arg(long)]
    pub history: Option<usize>,

    /// Minimum net growth (MB) within the window to consider a leak
    #[arg(long)]
    pub growth: Option<f64>,

    /// Minimum growth rate (MB/min) to consider a leak
    #[arg(long)]
    pub slope: Option<f64>,

    /// Consecutive leak windows needed before killing
    #[arg(long = "conf")]
    pub confirmations: Option<u32>,

    /// Seconds to ignore new processes
    #[arg(long)]
    pub grace: Option<u64>,

    /// Cooldown seconds after a suspect process plateaus
    #[arg(long = "cool")]
    pub cooldown: Option<u64>,

    /// RAM percentage that triggers pressure relief
    #[arg(long)]
    pub high: Option<f64>,

    /// RAM percentage at which pressure relief stops (must be < --high)
    #[arg(long)]
    pub low: Option<f64>,

    /// Seconds during which a process counts as young (more suspicious)
    #[arg(long)]
    pub recent: Option<u64>,

    /// Suspicion score added per child process
    #[arg(long = "child-wt")]
    pub child_weight: Option<f64>,

    /// Kills of the same process/parent pair before a notification is sent
    #[arg(long)]
    pub notify_threshold: Option<usize>,

    /// Look-back window (seconds) for counting repeated kills
    #[arg(long)]
    pub notify_window: Option<u64>,

    /// Minimum RAM percentage to kill leaks in protection mode
    #[arg(long)]
    pub leak_threshold: Option<f64>,

    /// Kill all detected leaks regardless of RAM usage
    #[arg(long, conflicts_with = "protection_mode")]
    pub hunting_mode: bool,

    /// Only kill leaks when RAM is high (default)
    #[arg(long, conflicts_with = "hunting_mode")]
    pub protection_mode: bool,

    /// Enable Docker container monitoring
    #[arg(long, alias = "containers")]
    pub docker: bool,

    /// Only monitor processes started from one of the scope ancestors (terminal emulators by default)
    #[arg(long)]
    pub scope_restrict: bool,

    /// Additional process names never to kill (comma-separated)
    #[arg(long)]
    pub exclude_names: Option<String>,

    /// Do not bound thresholds from RAM size and CPU count
    #[arg(long)]
    pub no_auto_tune: bool,

    /// Event log file for kill decisions
    #[arg(long)]
    pub event_log: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for daemon management and diagnostics
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check /proc filesystem
        #[arg(long)]
        proc: bool,

        /// Check Docker availability
        #[arg(long)]
        docker: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Install system-wide with systemd service
    Install {
        /// Skip systemd service enable/start
        #[arg(long)]
        no_service: bool,

        /// Force reinstall (overwrite existing)
        #[arg(long)]
        force: bool,
    },

    /// Uninstall system-wide installation
    Uninstall {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Start the installed systemd service
    Start,

    /// Stop the installed systemd service
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_conflict() {
        let res = Args::try_parse_from(["herakles-leak-guard", "--hunting-mode", "--protection-mode"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_knobs_parse() {
        let args = Args::try_parse_from([
            "herakles-leak-guard",
            "--slope",
            "30",
            "--conf",
            "3",
            "--cool",
            "120",
            "--child-wt",
            "2.5",
            "--containers",
        ])
        .expect("valid args");
        assert_eq!(args.slope, Some(30.0));
        assert_eq!(args.confirmations, Some(3));
        assert_eq!(args.cooldown, Some(120));
        assert_eq!(args.child_weight, Some(2.5));
        assert!(args.docker);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_subcommand_parse() {
        let args = Args::try_parse_from(["herakles-leak-guard", "install", "--force"]).expect("valid args");
        match args.command {
            Some(Commands::Install { force, no_service }) => {
                assert!(force);
                assert!(!no_service);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
