//! Error types shared by the decision engine and its collaborators.

use thiserror::Error;

/// Rejected configuration. Raised before any monitoring begins.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("interval must be at least 1 second (got {0})")]
    IntervalTooShort(u64),

    #[error("history must be at least 2 samples (got {0})")]
    HistoryTooShort(usize),

    #[error("{name} must be a non-negative number (got {value})")]
    NegativeThreshold { name: &'static str, value: f64 },

    #[error("confirmations must be at least 1")]
    NoConfirmations,

    #[error("high ({high}%) must be greater than low ({low}%)")]
    WaterMarksInverted { high: f64, low: f64 },

    #[error("{name} must be between 0 and 100 (got {value})")]
    PercentOutOfRange { name: &'static str, value: f64 },

    #[error("recent window must be greater than 0 seconds")]
    EmptyRecentWindow,

    #[error("notify threshold must be at least 1")]
    NoNotifyThreshold,

    #[error("monotonic ratio must be within 0.0..=1.0 (got {0})")]
    RatioOutOfRange(f64),

    #[error("scope restriction is enabled but no scope ancestors are configured")]
    EmptyScope,
}

/// Failure of a telemetry source for one cycle.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The source cannot work on this host at all (e.g. docker not installed).
    #[error("telemetry source unavailable: {0}")]
    Unavailable(String),

    /// The source failed this time; it is retried next cycle.
    #[error("telemetry read failed: {0}")]
    Failed(String),
}

/// Outcome of a failed termination attempt.
#[derive(Debug, Error)]
pub enum TerminateError {
    /// The entity was gone before or while it was signalled.
    #[error("target vanished before it could be terminated")]
    Vanished,

    #[error("termination denied: {0}")]
    Denied(String),

    #[error("termination failed: {0}")]
    Failed(String),
}
