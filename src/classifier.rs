//! Leak test and the per-entity state machine.
//!
//! A tracker moves through FILLING (buffer not yet full), CLEAN, SUSPECT(n)
//! and COOLDOWN. [`evaluate`] performs one transition per observed sample and
//! reports where the tracker ended up; the engine turns a
//! [`Verdict::Confirmed`] into a kill decision.

use crate::dynamic::DynamicParams;
use crate::regression::{non_decreasing_ratio, window_stats};
use crate::tracker::Tracker;

/// Result of evaluating one tracker for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Buffer not full yet
    Filling,
    /// Skipped, `now < exempt_until`
    Cooldown,
    /// Full window, no leak, no prior streak
    Clean,
    /// Full window, no leak, a streak just ended; cooldown started
    Plateaued,
    /// Leak test passed `n` times in a row, below the confirmation count
    Suspect(u32),
    /// Leak test passed `n` times in a row, at or above the confirmation count
    Confirmed(u32),
}

/// Returns true if the tracker's full window matches the leak definition.
///
/// All of: buffer full, at least `monotonic_ratio` of consecutive pairs
/// non-decreasing, slope above the current slope threshold and net growth
/// above the current growth threshold.
pub fn is_leaking(tracker: &Tracker, params: &DynamicParams, monotonic_ratio: f64) -> bool {
    if !tracker.is_full() {
        return false;
    }
    let stats = window_stats(&tracker.history);
    non_decreasing_ratio(&tracker.history) >= monotonic_ratio
        && stats.slope_bytes_per_sec > params.current_slope
        && stats.net_growth_bytes as f64 > params.current_growth
}

/// Advances the tracker's state machine by one observation.
pub fn evaluate(
    tracker: &mut Tracker,
    params: &DynamicParams,
    monotonic_ratio: f64,
    cooldown_secs: f64,
    now: f64,
) -> Verdict {
    if tracker.in_cooldown(now) {
        return Verdict::Cooldown;
    }
    if !tracker.is_full() {
        return Verdict::Filling;
    }

    tracker.growth_rate = window_stats(&tracker.history).slope_bytes_per_sec;

    if is_leaking(tracker, params, monotonic_ratio) {
        tracker.suspect_runs += 1;
        if tracker.suspect_runs >= params.current_confirmations {
            Verdict::Confirmed(tracker.suspect_runs)
        } else {
            Verdict::Suspect(tracker.suspect_runs)
        }
    } else {
        let was_suspect = tracker.suspect_runs > 0;
        tracker.reset();
        if was_suspect {
            tracker.exempt_until = now + cooldown_secs;
            Verdict::Plateaued
        } else {
            Verdict::Clean
        }
    }
}
