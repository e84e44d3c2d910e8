//! Herakles Leak Guard Library
//!
//! Decision engine of a resident memory governor. It keeps a bounded RSS
//! history for every process (and optionally every container), fits a
//! least-squares trend to it, confirms leaks across consecutive windows and
//! terminates leakers or, under memory pressure, the most suspicious entities.
//!
//! # Features
//!
//! - **Regression-based leak test**: slope, net growth and monotonicity over a sliding window
//! - **Pressure-driven tuning**: thresholds and confirmations tighten as RAM fills up
//! - **Critical-threat bypass**: entities about to exhaust memory are killed immediately
//! - **Pressure relief**: weighted suspicion ranking with high/low water-mark hysteresis
//! - **Recidivism escalation**: repeat offenders trigger a user notification
//!
//! The engine talks to the host only through the traits in [`telemetry`], so
//! it can be driven by scripted fakes and a [`ManualClock`].
//!
//! # Usage
//!
//! ```rust
//! use herakles_leak_guard::{window_stats, HistoryBuffer, Sample};
//!
//! let mut history = HistoryBuffer::new(6);
//! for i in 0..6u64 {
//!     history.push(Sample::new(i as f64 * 5.0, (100 + i * 12) * 1024 * 1024));
//! }
//!
//! let stats = window_stats(&history);
//! assert!(stats.slope_mb_per_min() > 140.0);
//! assert_eq!(stats.net_growth_bytes, 60 * 1024 * 1024);
//! ```

pub mod classifier;
pub mod clock;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod history;
pub mod profile;
pub mod ranker;
pub mod recidivism;
pub mod regression;
pub mod settings;
pub mod telemetry;
pub mod threat;
pub mod tracker;

// Re-export main types for convenience
pub use classifier::Verdict;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dynamic::DynamicParams;
pub use engine::{Collaborators, CycleReport, Engine, Kill, KillReason, ReliefOutcome};
pub use error::{ConfigError, TelemetryError, TerminateError};
pub use history::{HistoryBuffer, Sample};
pub use profile::SystemProfile;
pub use recidivism::Escalation;
pub use regression::{window_stats, WindowStats};
pub use settings::{Mode, ScoreWeights, Settings};
pub use telemetry::{
    ContainerSnapshot, EntityKey, EventLog, Notifier, ProcessSnapshot, SystemUsage, Target, TelemetrySource,
    Terminator,
};
pub use tracker::{Tracker, TrackerRegistry};
