//! Configuration management for herakles-leak-guard.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use anyhow::{Context, Result};
use herakles_leak_guard::settings::{self, Mode, ScoreWeights, Settings};
use herakles_leak_guard::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_EVENT_LOG: &str = "/var/log/herakles-leak-guard.log";

/// Processes that are never tracked or killed.
pub const DEFAULT_WHITELIST: &[&str] = &[
    // Init & kernel helpers
    "init",
    "systemd",
    "kthreadd",
    // Core system daemons
    "systemd-journald",
    "systemd-logind",
    "systemd-udevd",
    "systemd-resolved",
    "systemd-networkd",
    "systemd-timesyncd",
    "dbus-daemon",
    "dbus-broker",
    "polkitd",
    "udisksd",
    "NetworkManager",
    "wpa_supplicant",
    "rsyslogd",
    "cron",
    "crond",
    "sshd",
    "agetty",
    "login",
    // Display & session
    "Xorg",
    "Xwayland",
    "gnome-shell",
    "kwin_wayland",
    "kwin_x11",
    "plasmashell",
    "gdm",
    "sddm",
    "lightdm",
    "pipewire",
    "wireplumber",
    "pulseaudio",
    // Container runtimes
    "dockerd",
    "containerd",
    "containerd-shim",
    "containerd-shim-runc-v2",
    // Ourselves
    "herakles-leak-guard",
];

/// Terminal emulators used as scope roots by `--scope-restrict`.
pub const DEFAULT_SCOPE_ANCESTORS: &[&str] = &[
    "gnome-terminal",
    "konsole",
    "xterm",
    "alacritty",
    "kitty",
    "wezterm",
    "tilix",
    "terminator",
    "xfce4-terminal",
    "foot",
];

/// File configuration; every field optional so partial files merge over defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Leak detector
    #[serde(alias = "interval")]
    pub interval_secs: Option<u64>,
    #[serde(alias = "history")]
    pub history_len: Option<usize>,
    #[serde(alias = "growth")]
    pub growth_mb: Option<f64>,
    #[serde(alias = "slope")]
    pub slope_mb_per_min: Option<f64>,
    #[serde(alias = "conf")]
    pub confirmations: Option<u32>,
    #[serde(alias = "grace")]
    pub grace_secs: Option<u64>,
    #[serde(alias = "cool")]
    pub cooldown_secs: Option<u64>,
    #[serde(alias = "monotonic-ratio")]
    pub monotonic_ratio: Option<f64>,
    #[serde(alias = "adjust-interval")]
    pub adjust_interval_secs: Option<u64>,

    // Pressure relief
    #[serde(alias = "high")]
    pub high_pct: Option<f64>,
    #[serde(alias = "low")]
    pub low_pct: Option<f64>,
    #[serde(alias = "recent")]
    pub recent_secs: Option<u64>,
    #[serde(alias = "child-wt")]
    pub child_weight: Option<f64>,

    // Mode
    /// "hunting" | "protection"
    pub mode: Option<Mode>,
    #[serde(alias = "leak-threshold")]
    pub leak_threshold_pct: Option<f64>,

    // Notification
    #[serde(alias = "notify-threshold")]
    pub notify_threshold: Option<usize>,
    #[serde(alias = "notify-window")]
    pub notify_window_secs: Option<u64>,

    // Scope
    #[serde(alias = "scope-restrict")]
    pub scope_restricted: Option<bool>,
    #[serde(alias = "scope-ancestors")]
    pub scope_ancestors: Option<Vec<String>>,
    /// Replaces the built-in whitelist when set
    pub whitelist: Option<Vec<String>>,
    /// Added on top of the whitelist
    #[serde(alias = "exclude-names")]
    pub exclude_names: Option<Vec<String>>,

    // Feature flags
    #[serde(alias = "docker")]
    pub containers: Option<bool>,
    #[serde(alias = "auto-tune")]
    pub auto_tune: Option<bool>,

    // Logging
    pub log_level: Option<String>,
    #[serde(alias = "event-log")]
    pub event_log: Option<PathBuf>,

    // Scoring weights (kept last: TOML needs tables after plain values)
    pub weights: Option<ScoreWeights>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: Some(settings::DEFAULT_INTERVAL_SECS),
            history_len: Some(settings::DEFAULT_HISTORY_LEN),
            growth_mb: Some(settings::DEFAULT_GROWTH_MB),
            slope_mb_per_min: Some(settings::DEFAULT_SLOPE_MB_PER_MIN),
            confirmations: Some(settings::DEFAULT_CONFIRMATIONS),
            grace_secs: Some(settings::DEFAULT_GRACE_SECS),
            cooldown_secs: Some(settings::DEFAULT_COOLDOWN_SECS),
            monotonic_ratio: Some(settings::DEFAULT_MONOTONIC_RATIO),
            adjust_interval_secs: Some(settings::DEFAULT_ADJUST_INTERVAL_SECS),
            high_pct: Some(settings::DEFAULT_HIGH_PCT),
            low_pct: Some(settings::DEFAULT_LOW_PCT),
            recent_secs: Some(settings::DEFAULT_RECENT_SECS),
            child_weight: Some(settings::DEFAULT_CHILD_WEIGHT),
            mode: Some(Mode::Protection),
            leak_threshold_pct: Some(settings::DEFAULT_LEAK_THRESHOLD_PCT),
            notify_threshold: Some(settings::DEFAULT_NOTIFY_THRESHOLD),
            notify_window_secs: Some(settings::DEFAULT_NOTIFY_WINDOW_SECS),
            scope_restricted: Some(false),
            scope_ancestors: Some(to_strings(DEFAULT_SCOPE_ANCESTORS)),
            whitelist: Some(to_strings(DEFAULT_WHITELIST)),
            exclude_names: None,
            containers: Some(false),
            auto_tune: Some(true),
            log_level: Some("info".into()),
            event_log: Some(PathBuf::from(DEFAULT_EVENT_LOG)),
            weights: Some(ScoreWeights::default()),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Engine settings with unset fields falling back to defaults.
    pub fn to_settings(&self) -> Settings {
        let d = Settings::default();

        let mut whitelist = self
            .whitelist
            .clone()
            .unwrap_or_else(|| to_strings(DEFAULT_WHITELIST));
        if let Some(extra) = &self.exclude_names {
            whitelist.extend(extra.iter().cloned());
        }

        let mut weights = self.weights.unwrap_or_default();
        if let Some(child) = self.child_weight {
            weights.child = child;
        }

        Settings {
            interval_secs: self.interval_secs.unwrap_or(d.interval_secs),
            history_len: self.history_len.unwrap_or(d.history_len),
            growth_mb: self.growth_mb.unwrap_or(d.growth_mb),
            slope_mb_per_min: self.slope_mb_per_min.unwrap_or(d.slope_mb_per_min),
            confirmations: self.confirmations.unwrap_or(d.confirmations),
            grace_secs: self.grace_secs.unwrap_or(d.grace_secs),
            cooldown_secs: self.cooldown_secs.unwrap_or(d.cooldown_secs),
            high_pct: self.high_pct.unwrap_or(d.high_pct),
            low_pct: self.low_pct.unwrap_or(d.low_pct),
            leak_threshold_pct: self.leak_threshold_pct.unwrap_or(d.leak_threshold_pct),
            recent_secs: self.recent_secs.unwrap_or(d.recent_secs),
            notify_threshold: self.notify_threshold.unwrap_or(d.notify_threshold),
            notify_window_secs: self.notify_window_secs.unwrap_or(d.notify_window_secs),
            adjust_interval_secs: self.adjust_interval_secs.unwrap_or(d.adjust_interval_secs),
            monotonic_ratio: self.monotonic_ratio.unwrap_or(d.monotonic_ratio),
            mode: self.mode.unwrap_or(d.mode),
            scope_restricted: self.scope_restricted.unwrap_or(false),
            scope_ancestors: self
                .scope_ancestors
                .clone()
                .unwrap_or_else(|| to_strings(DEFAULT_SCOPE_ANCESTORS)),
            containers: self.containers.unwrap_or(false),
            whitelist,
            weights,
        }
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.event_log
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_LOG))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    cfg.to_settings().validate()
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    macro_rules! override_opt {
        ($($arg:ident => $field:ident),* $(,)?) => {
            $(
                if let Some(v) = args.$arg {
                    config.$field = Some(v);
                }
            )*
        };
    }

    override_opt!(
        interval => interval_secs,
        history => history_len,
        growth => growth_mb,
        slope => slope_mb_per_min,
        confirmations => confirmations,
        grace => grace_secs,
        cooldown => cooldown_secs,
        high => high_pct,
        low => low_pct,
        recent => recent_secs,
        child_weight => child_weight,
        notify_threshold => notify_threshold,
        notify_window => notify_window_secs,
        leak_threshold => leak_threshold_pct,
    );

    // Mode flags are mutually exclusive at the CLI level
    if args.hunting_mode {
        config.mode = Some(Mode::Hunting);
    }
    if args.protection_mode {
        config.mode = Some(Mode::Protection);
    }

    if args.docker {
        config.containers = Some(true);
    }
    if args.scope_restrict {
        config.scope_restricted = Some(true);
    }
    if args.no_auto_tune {
        config.auto_tune = Some(false);
    }

    if let Some(exclude_str) = &args.exclude_names {
        let mut names = config.exclude_names.take().unwrap_or_default();
        names.extend(split_names(exclude_str));
        config.exclude_names = Some(names);
    }

    if let Some(path) = &args.event_log {
        config.event_log = Some(path.clone());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/leak-guard.yaml",
            "/etc/herakles/leak-guard.yml",
            "/etc/herakles/leak-guard.json",
            "/etc/herakles/leak-guard.toml",
            "./herakles-leak-guard.yaml",
            "./herakles-leak-guard.yml",
            "./herakles-leak-guard.json",
            "./herakles-leak-guard.toml",
        ];

        match defaults.iter().find(|p| Path::new(p).exists()) {
            Some(found) => PathBuf::from(found),
            None => return Ok(Config::default()),
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config = serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON in {}", path.display()))?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config = toml::from_str(&content)
                .with_context(|| format!("invalid TOML in {}", path.display()))?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            // Default to YAML
            let config = serde_yaml::from_str(&content)
                .with_context(|| format!("invalid YAML in {}", path.display()))?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };

    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: &ConfigFormat) -> Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
