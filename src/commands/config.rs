//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-leak-guard.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
pub(crate) fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Leak Guard Configuration
# =================================
#
# Leak Detection
# --------------
# interval_secs: 5             # Seconds between sampling cycles
# history_len: 6               # Samples per regression window
# growth_mb: 50                # Min net growth (MB) across the window
# slope_mb_per_min: 20         # Min regression slope (MB/min)
# confirmations: 2             # Consecutive leak-positive windows before a kill
# grace_secs: 60               # Ignore processes younger than this
# cooldown_secs: 300           # Exemption after a suspect plateaus
# monotonic_ratio: 0.8         # Min fraction of non-decreasing steps
# adjust_interval_secs: 30     # Min seconds between pressure re-tuning
#
# Pressure Relief
# ---------------
# high_pct: 90                 # Start killing at this RAM usage (%)
# low_pct: 85                  # Stop killing at this RAM usage (%)
# recent_secs: 180             # Processes younger than this score higher
# child_weight: 5              # Score per descendant process
#
# Mode
# ----
# mode: protection             # "protection" or "hunting"
# leak_threshold_pct: 85       # Protection mode kills leaks only above this RAM %
#
# Notifications
# -------------
# notify_threshold: 3          # Kills of the same program before an alert
# notify_window_secs: 600      # Window for counting repeat kills
#
# Scope
# -----
# scope_restricted: false      # Only consider processes under scope_ancestors
# scope_ancestors: [...]       # Ancestor name prefixes (terminal emulators)
# whitelist: [...]             # Exact process names never touched
# exclude_names: null          # Extra names added to the whitelist
#
# Scoring
# -------
# weights: {suspect: 20, slope: 2, youth: 10, child: 5, rss: 0.01}
#
# Feature Flags
# -------------
# containers: false            # Also monitor docker containers
# auto_tune: true              # Derive defaults from RAM size and CPU count
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
# event_log: "/var/log/herakles-leak-guard.log"
"#;

    format!("{comments}\n{yaml}")
}
