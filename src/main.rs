//! herakles-leak-guard - version 0.1.0
//!
//! Resident memory governor with tracing logging.
//! This is the main entry point that wires the Linux collaborators into the
//! engine, runs the monitoring loop and handles subcommands.

mod cli;
mod commands;
mod config;
mod docker;
mod event_log;
mod exec;
mod linux;
mod notifier;
mod process;
mod startup_checks;
mod system;
mod terminate;

use clap::Parser;
use herakles_leak_guard::{Collaborators, CycleReport, Engine, ReliefOutcome, SystemClock};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_install, command_start, command_stop, command_uninstall};
use config::{resolve_config, show_config, validate_effective_config, Config};
use docker::DockerCli;
use event_log::FileEventLog;
use linux::LinuxTelemetry;
use notifier::NotifySend;
use terminate::LinuxTerminator;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn level_from_str(s: &str) -> Option<LevelFilter> {
    match s.to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

/// Initializes tracing logging subsystem with configured log level.
///
/// An explicit `--log-level` other than the default wins over the config file.
fn setup_logging(config: &Config, args: &Args) {
    let cli_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };
    let log_level = match (&args.log_level, config.log_level.as_deref().and_then(level_from_str)) {
        (LogLevel::Info, Some(file_level)) => file_level,
        _ => cli_level,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {}", log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

fn log_build_info() {
    info!(
        "herakles-leak-guard v{} (git {} built {})",
        VERSION,
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
    );
}

/// Builds the engine on top of procfs, docker, notify-send and the event log file.
fn build_engine(config: &Config) -> Result<Engine, Box<dyn std::error::Error>> {
    let proc_root = PathBuf::from("/proc");
    let boot_time = system::read_boot_time(&proc_root)?;
    let profile = system::detect_profile(&proc_root)?;

    let mut settings = config.to_settings();
    if config.auto_tune.unwrap_or(true) {
        profile.tune(&mut settings);
    } else {
        info!("Auto tuning disabled, using configured thresholds as-is");
    }

    let collab = Collaborators {
        clock: Box::new(SystemClock),
        telemetry: Box::new(LinuxTelemetry::new(proc_root.clone(), boot_time, DockerCli::default())),
        terminator: Box::new(LinuxTerminator::new(proc_root, boot_time, DockerCli::default())),
        notifier: Box::new(NotifySend::default()),
        event_log: Box::new(FileEventLog::new(config.event_log_path())),
    };

    Ok(Engine::new(settings, profile, collab)?)
}

fn log_report(report: &CycleReport) {
    debug!(
        "Cycle: usage={:.1}% tracked={} pruned={} adjusted={}",
        report.usage_pct, report.tracked, report.pruned, report.params_adjusted
    );
    for kill in &report.kills {
        info!("Terminated {} ({}) reason={}", kill.name, kill.key, kill.reason);
    }
    match report.relief {
        Some(ReliefOutcome::Relieved { kills, usage_pct }) => {
            info!("Pressure relieved with {} kill(s), RAM now {:.1}%", kills, usage_pct)
        }
        Some(ReliefOutcome::Exhausted { kills, usage_pct }) => {
            warn!("Pressure relief exhausted after {} kill(s), RAM still {:.1}%", kills, usage_pct)
        }
        None => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        show_config(&config, &args.config_format)?;
        return Ok(());
    }

    if let Some(command) = &args.command {
        return match command {
            Commands::Install { no_service, force } => command_install(*no_service, *force),
            Commands::Uninstall { yes } => command_uninstall(*yes),
            Commands::Start => command_start(),
            Commands::Stop => command_stop(),
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),
            Commands::Check { proc, docker, all } => {
                let config = load_validated_config(&args)?;
                command_check(*proc, *docker, *all, &config)
            }
        };
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);
    log_build_info();

    if let Err(e) = startup_checks::validate_requirements(Path::new("/proc"), config.containers.unwrap_or(false)) {
        error!("❌ Startup validation failed: {}", e);
        std::process::exit(1);
    }

    let mut engine = build_engine(&config)?;
    engine.announce(VERSION);
    let interval = Duration::from_secs(engine.settings().interval_secs);

    info!(
        "Monitoring every {}s in {} mode (high={}%, low={}%)",
        interval.as_secs(),
        engine.settings().mode,
        engine.settings().high_pct,
        engine.settings().low_pct
    );

    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };
    tokio::pin!(shutdown_signal);

    loop {
        // A cycle blocks on /proc reads, child processes and kill grace periods
        let handle = tokio::task::spawn_blocking(move || {
            let result = engine.run_cycle();
            (engine, result)
        });

        let (returned, result) = match handle.await {
            Ok(v) => v,
            Err(e) => {
                error!("Monitoring cycle panicked: {}", e);
                return Err(e.into());
            }
        };
        engine = returned;

        match result {
            Ok(report) => log_report(&report),
            Err(e) => warn!("Monitoring cycle skipped: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received, exiting...");
                break;
            }
        }
    }

    info!("herakles-leak-guard stopped gracefully");
    Ok(())
}
