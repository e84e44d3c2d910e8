//! Least-squares trend over a sample window.

use crate::history::HistoryBuffer;

/// Below this sum of squared time deviations the fit is degenerate.
const MIN_TIME_VARIANCE: f64 = 1e-9;

/// Slope and net growth of one history window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WindowStats {
    pub slope_bytes_per_sec: f64,
    pub net_growth_bytes: i64,
}

impl WindowStats {
    pub fn slope_mb_per_min(&self) -> f64 {
        bytes_per_sec_to_mb_per_min(self.slope_bytes_per_sec)
    }
}

pub fn bytes_per_sec_to_mb_per_min(bps: f64) -> f64 {
    bps * 60.0 / (1024.0 * 1024.0)
}

/// Computes the OLS slope of memory against time and last-minus-first growth.
///
/// Fewer than two samples yield zeros. When every sample shares (nearly) the
/// same timestamp the slope is forced to 0 but growth is still reported.
pub fn window_stats(history: &HistoryBuffer) -> WindowStats {
    let n = history.len();
    if n < 2 {
        return WindowStats::default();
    }

    let (first, last) = match (history.first(), history.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return WindowStats::default(),
    };
    let net_growth_bytes = last.memory_bytes as i64 - first.memory_bytes as i64;

    let nf = n as f64;
    let mean_x = history.iter().map(|s| s.timestamp).sum::<f64>() / nf;
    let mean_y = history.iter().map(|s| s.memory_bytes as f64).sum::<f64>() / nf;

    let denom: f64 = history
        .iter()
        .map(|s| (s.timestamp - mean_x).powi(2))
        .sum();
    if denom < MIN_TIME_VARIANCE {
        return WindowStats {
            slope_bytes_per_sec: 0.0,
            net_growth_bytes,
        };
    }

    let numer: f64 = history
        .iter()
        .map(|s| (s.timestamp - mean_x) * (s.memory_bytes as f64 - mean_y))
        .sum();

    WindowStats {
        slope_bytes_per_sec: numer / denom,
        net_growth_bytes,
    }
}

/// Fraction of consecutive sample pairs where memory did not decrease.
pub fn non_decreasing_ratio(history: &HistoryBuffer) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let samples = history.to_vec();
    let rising = samples
        .windows(2)
        .filter(|w| w[1].memory_bytes >= w[0].memory_bytes)
        .count();
    rising as f64 / (samples.len() - 1) as f64
}
