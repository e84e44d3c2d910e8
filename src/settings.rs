//! Validated engine settings.
//!
//! The binary resolves CLI flags and config files into a [`Settings`] value;
//! the engine refuses to start unless [`Settings::validate`] passes.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// Heuristic defaults
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_HISTORY_LEN: usize = 6;
pub const DEFAULT_GROWTH_MB: f64 = 50.0;
pub const DEFAULT_SLOPE_MB_PER_MIN: f64 = 20.0;
pub const DEFAULT_CONFIRMATIONS: u32 = 2;
pub const DEFAULT_GRACE_SECS: u64 = 60;
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_HIGH_PCT: f64 = 90.0;
pub const DEFAULT_LOW_PCT: f64 = 85.0;
pub const DEFAULT_RECENT_SECS: u64 = 180;
pub const DEFAULT_CHILD_WEIGHT: f64 = 5.0;
pub const DEFAULT_NOTIFY_THRESHOLD: usize = 3;
pub const DEFAULT_NOTIFY_WINDOW_SECS: u64 = 600;
pub const DEFAULT_LEAK_THRESHOLD_PCT: f64 = 85.0;
pub const DEFAULT_ADJUST_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MONOTONIC_RATIO: f64 = 0.8;

pub const MB: f64 = 1024.0 * 1024.0;

/// Whether confirmed leaks are always killed or only under memory pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Kill every confirmed leak.
    Hunting,
    /// Kill confirmed leaks only when usage is at or above the leak threshold.
    #[default]
    Protection,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Hunting => write!(f, "hunting"),
            Mode::Protection => write!(f, "protection"),
        }
    }
}

/// Coefficients of the pressure-relief suspicion score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Per consecutive leak-positive window
    #[serde(default = "default_suspect_weight")]
    pub suspect: f64,
    /// Per MB/min of regression slope
    #[serde(default = "default_slope_weight")]
    pub slope: f64,
    /// Scaled by how young the process is within the recent window
    #[serde(default = "default_youth_weight")]
    pub youth: f64,
    /// Per descendant process
    #[serde(default = "default_child_weight")]
    pub child: f64,
    /// Per MB of resident memory
    #[serde(default = "default_rss_weight")]
    pub rss: f64,
}

fn default_suspect_weight() -> f64 {
    20.0
}
fn default_slope_weight() -> f64 {
    2.0
}
fn default_youth_weight() -> f64 {
    10.0
}
fn default_child_weight() -> f64 {
    DEFAULT_CHILD_WEIGHT
}
fn default_rss_weight() -> f64 {
    0.01
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            suspect: default_suspect_weight(),
            slope: default_slope_weight(),
            youth: default_youth_weight(),
            child: default_child_weight(),
            rss: default_rss_weight(),
        }
    }
}

/// Effective engine settings in human units (seconds, MB, percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub interval_secs: u64,
    pub history_len: usize,
    pub growth_mb: f64,
    pub slope_mb_per_min: f64,
    pub confirmations: u32,
    pub grace_secs: u64,
    pub cooldown_secs: u64,
    pub high_pct: f64,
    pub low_pct: f64,
    pub leak_threshold_pct: f64,
    pub recent_secs: u64,
    pub notify_threshold: usize,
    pub notify_window_secs: u64,
    pub adjust_interval_secs: u64,
    pub monotonic_ratio: f64,
    pub mode: Mode,
    pub scope_restricted: bool,
    pub scope_ancestors: Vec<String>,
    pub containers: bool,
    pub whitelist: Vec<String>,
    pub weights: ScoreWeights,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            history_len: DEFAULT_HISTORY_LEN,
            growth_mb: DEFAULT_GROWTH_MB,
            slope_mb_per_min: DEFAULT_SLOPE_MB_PER_MIN,
            confirmations: DEFAULT_CONFIRMATIONS,
            grace_secs: DEFAULT_GRACE_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            high_pct: DEFAULT_HIGH_PCT,
            low_pct: DEFAULT_LOW_PCT,
            leak_threshold_pct: DEFAULT_LEAK_THRESHOLD_PCT,
            recent_secs: DEFAULT_RECENT_SECS,
            notify_threshold: DEFAULT_NOTIFY_THRESHOLD,
            notify_window_secs: DEFAULT_NOTIFY_WINDOW_SECS,
            adjust_interval_secs: DEFAULT_ADJUST_INTERVAL_SECS,
            monotonic_ratio: DEFAULT_MONOTONIC_RATIO,
            mode: Mode::default(),
            scope_restricted: false,
            scope_ancestors: Vec::new(),
            containers: false,
            whitelist: Vec::new(),
            weights: ScoreWeights::default(),
        }
    }
}

impl Settings {
    /// Checks every bound the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < 1 {
            return Err(ConfigError::IntervalTooShort(self.interval_secs));
        }
        if self.history_len < 2 {
            return Err(ConfigError::HistoryTooShort(self.history_len));
        }

        let non_negative = [
            ("growth", self.growth_mb),
            ("slope", self.slope_mb_per_min),
            ("child weight", self.weights.child),
            ("suspect weight", self.weights.suspect),
            ("slope weight", self.weights.slope),
            ("youth weight", self.weights.youth),
            ("rss weight", self.weights.rss),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeThreshold { name, value });
            }
        }

        if self.confirmations < 1 {
            return Err(ConfigError::NoConfirmations);
        }

        for (name, value) in [
            ("high", self.high_pct),
            ("low", self.low_pct),
            ("leak threshold", self.leak_threshold_pct),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::PercentOutOfRange { name, value });
            }
        }
        if self.high_pct <= self.low_pct {
            return Err(ConfigError::WaterMarksInverted {
                high: self.high_pct,
                low: self.low_pct,
            });
        }

        if self.recent_secs == 0 {
            return Err(ConfigError::EmptyRecentWindow);
        }
        if self.notify_threshold < 1 {
            return Err(ConfigError::NoNotifyThreshold);
        }
        if !(0.0..=1.0).contains(&self.monotonic_ratio) {
            return Err(ConfigError::RatioOutOfRange(self.monotonic_ratio));
        }
        if self.scope_restricted && self.scope_ancestors.is_empty() {
            return Err(ConfigError::EmptyScope);
        }

        Ok(())
    }

    pub fn slope_bytes_per_sec(&self) -> f64 {
        self.slope_mb_per_min * MB / 60.0
    }

    pub fn growth_bytes(&self) -> f64 {
        self.growth_mb * MB
    }
}
