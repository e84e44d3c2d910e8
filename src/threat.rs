//! Time-to-exhaustion estimate for fast-growing entities.

use crate::settings::MB;
use crate::tracker::Tracker;

/// Growth below this rate (bytes/min) is never critical.
pub const MIN_CRITICAL_GROWTH_PER_MIN: f64 = MB;

/// Entities projected to exhaust available memory sooner than this are killed
/// without waiting for confirmations.
pub const CRITICAL_HORIZON_MIN: f64 = 2.0;

/// Minutes until available memory is gone at `growth_bytes_per_sec`.
///
/// Returns `None` when growth is below [`MIN_CRITICAL_GROWTH_PER_MIN`].
pub fn minutes_to_exhaustion(growth_bytes_per_sec: f64, usage_pct: f64, total_bytes: u64) -> Option<f64> {
    let growth_per_min = growth_bytes_per_sec * 60.0;
    if growth_per_min < MIN_CRITICAL_GROWTH_PER_MIN {
        return None;
    }
    let available = ((100.0 - usage_pct).max(0.0)) * total_bytes as f64 / 100.0;
    Some(available / growth_per_min)
}

/// True if a full tracker with positive growth would exhaust memory within
/// [`CRITICAL_HORIZON_MIN`].
pub fn is_critical_threat(tracker: &Tracker, usage_pct: f64, total_bytes: u64) -> bool {
    if !tracker.is_full() || tracker.growth_rate <= 0.0 {
        return false;
    }
    minutes_to_exhaustion(tracker.growth_rate, usage_pct, total_bytes)
        .map(|mins| mins < CRITICAL_HORIZON_MIN)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn full_tracker(growth_mb_per_min: f64) -> Tracker {
        let mut trk = Tracker::new(2);
        trk.add(0.0, 0);
        trk.add(5.0, 0);
        trk.growth_rate = growth_mb_per_min * MB / 60.0;
        trk
    }

    #[test]
    fn test_moderate_growth_is_not_critical() {
        let trk = full_tracker(50.0);
        let mins = minutes_to_exhaustion(trk.growth_rate, 95.0, 16 * GIB).unwrap();
        assert!((mins - 16.384).abs() < 0.01, "got {}", mins);
        assert!(!is_critical_threat(&trk, 95.0, 16 * GIB));
    }

    #[test]
    fn test_fast_growth_is_critical() {
        let trk = full_tracker(500.0);
        let mins = minutes_to_exhaustion(trk.growth_rate, 95.0, 16 * GIB).unwrap();
        assert!((mins - 1.6384).abs() < 0.01, "got {}", mins);
        assert!(is_critical_threat(&trk, 95.0, 16 * GIB));
    }

    #[test]
    fn test_tiny_growth_ignored_even_when_full() {
        // 0.5 MB/min with 100% usage would otherwise be "0 minutes left"
        let trk = full_tracker(0.5);
        assert_eq!(minutes_to_exhaustion(trk.growth_rate, 100.0, GIB), None);
        assert!(!is_critical_threat(&trk, 100.0, GIB));
    }

    #[test]
    fn test_requires_full_buffer_and_positive_growth() {
        let mut partial = Tracker::new(6);
        partial.add(0.0, 0);
        partial.growth_rate = 10_000.0 * MB;
        assert!(!is_critical_threat(&partial, 99.0, GIB));

        let shrinking = full_tracker(-500.0);
        assert!(!is_critical_threat(&shrinking, 99.0, GIB));
    }
}
