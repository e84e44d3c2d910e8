//! Pressure-driven tightening of the leak thresholds.
//!
//! As system memory usage rises the slope and growth thresholds shrink and
//! fewer confirmations are required; they relax again when pressure falls.
//! Recomputation happens at most once per adjustment interval.

use tracing::info;

use crate::settings::Settings;

/// Maps memory usage percent to a multiplier in `{0.5, 0.6, 0.7, 0.85, 1.0}`.
pub fn pressure_factor(usage_pct: f64) -> f64 {
    if usage_pct >= 90.0 {
        0.5
    } else if usage_pct >= 85.0 {
        0.6
    } else if usage_pct >= 80.0 {
        0.7
    } else if usage_pct >= 75.0 {
        0.85
    } else {
        1.0
    }
}

/// Base thresholds from configuration plus the currently effective ones.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicParams {
    pub base_slope: f64,  // bytes/sec
    pub base_growth: f64, // bytes
    pub base_confirmations: u32,
    pub current_slope: f64,
    pub current_growth: f64,
    pub current_confirmations: u32,
    pub pressure_factor: f64,
    /// Time of the last recomputation; `None` until the first one.
    pub last_adjust: Option<f64>,
    adjust_interval: f64,
}

impl DynamicParams {
    pub fn new(base_slope: f64, base_growth: f64, base_confirmations: u32, adjust_interval: f64) -> Self {
        Self {
            base_slope,
            base_growth,
            base_confirmations,
            current_slope: base_slope,
            current_growth: base_growth,
            current_confirmations: base_confirmations.max(1),
            pressure_factor: 1.0,
            last_adjust: None,
            adjust_interval,
        }
    }

    pub fn from_settings(s: &Settings) -> Self {
        Self::new(
            s.slope_bytes_per_sec(),
            s.growth_bytes(),
            s.confirmations,
            s.adjust_interval_secs as f64,
        )
    }

    /// Recomputes the effective thresholds unless the last recomputation was
    /// less than one adjustment interval ago. Returns whether it ran.
    pub fn adjust_for_pressure(&mut self, usage_pct: f64, now: f64) -> bool {
        if let Some(last) = self.last_adjust {
            if now - last < self.adjust_interval {
                return false;
            }
        }
        self.last_adjust = Some(now);

        let factor = pressure_factor(usage_pct);
        self.pressure_factor = factor;
        self.current_slope = self.base_slope * factor;
        self.current_growth = self.base_growth * factor;
        self.current_confirmations = ((self.base_confirmations as f64 * factor).floor() as u32).max(1);

        if factor < 1.0 {
            info!(
                "Adjusted params for {:.1}% RAM: factor={:.2}, confirmations={}",
                usage_pct, factor, self.current_confirmations
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_factor_steps() {
        assert_eq!(pressure_factor(0.0), 1.0);
        assert_eq!(pressure_factor(74.9), 1.0);
        assert_eq!(pressure_factor(75.0), 0.85);
        assert_eq!(pressure_factor(80.0), 0.7);
        assert_eq!(pressure_factor(85.0), 0.6);
        assert_eq!(pressure_factor(90.0), 0.5);
        assert_eq!(pressure_factor(100.0), 0.5);
    }

    #[test]
    fn test_pressure_factor_is_non_increasing() {
        let mut prev = pressure_factor(0.0);
        for tenth in 0..=1000 {
            let f = pressure_factor(tenth as f64 / 10.0);
            assert!(f <= prev, "factor rose at {}%", tenth as f64 / 10.0);
            prev = f;
        }
    }

    #[test]
    fn test_adjust_applies_factor() {
        let mut p = DynamicParams::new(1000.0, 2000.0, 3, 30.0);
        assert!(p.adjust_for_pressure(86.0, 100.0));

        assert_eq!(p.pressure_factor, 0.6);
        assert!((p.current_slope - 600.0).abs() < 1e-9);
        assert!((p.current_growth - 1200.0).abs() < 1e-9);
        assert_eq!(p.current_confirmations, 1); // floor(3 * 0.6)
    }

    #[test]
    fn test_confirmations_floor_at_one() {
        let mut p = DynamicParams::new(1.0, 1.0, 1, 30.0);
        p.adjust_for_pressure(95.0, 0.0);
        assert_eq!(p.current_confirmations, 1);
    }

    #[test]
    fn test_adjust_is_rate_limited() {
        let mut p = DynamicParams::new(1000.0, 2000.0, 4, 30.0);
        assert!(p.adjust_for_pressure(50.0, 100.0));
        assert_eq!(p.pressure_factor, 1.0);

        // Usage spikes within the interval: ignored
        assert!(!p.adjust_for_pressure(95.0, 110.0));
        assert!(!p.adjust_for_pressure(95.0, 129.9));
        assert_eq!(p.pressure_factor, 1.0);
        assert_eq!(p.current_confirmations, 4);

        assert!(p.adjust_for_pressure(95.0, 130.0));
        assert_eq!(p.pressure_factor, 0.5);
        assert_eq!(p.current_confirmations, 2);

        // And relaxes back once pressure subsides
        assert!(p.adjust_for_pressure(40.0, 160.0));
        assert_eq!(p.pressure_factor, 1.0);
        assert_eq!(p.current_slope, 1000.0);
    }
}
