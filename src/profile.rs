//! Static host profile taken once at startup.

use tracing::info;

use crate::settings::Settings;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Total memory and logical CPU count of the host. Never mutated after startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemProfile {
    pub total_memory_bytes: u64,
    pub cpu_count: usize,
}

impl SystemProfile {
    pub fn new(total_memory_bytes: u64, cpu_count: usize) -> Self {
        Self {
            total_memory_bytes,
            cpu_count: cpu_count.max(1),
        }
    }

    pub fn total_memory_gib(&self) -> f64 {
        self.total_memory_bytes as f64 / GIB
    }

    /// Bounds the configured thresholds to what suits this host.
    ///
    /// Small machines get tighter leak thresholds, faster sampling and lower
    /// water marks; large machines sample less often and give new processes a
    /// longer grace period. Hosts with few CPUs never sample faster than 6 s.
    pub fn tune(&self, s: &mut Settings) {
        let ram_gib = self.total_memory_gib();

        if ram_gib <= 8.0 {
            s.slope_mb_per_min = s.slope_mb_per_min.min(10.0);
            s.growth_mb = s.growth_mb.min(25.0);
            s.interval_secs = s.interval_secs.min(3);
            s.high_pct = s.high_pct.min(85.0);
            s.low_pct = s.low_pct.min(80.0);
            s.leak_threshold_pct = s.leak_threshold_pct.min(75.0);
        } else if ram_gib <= 16.0 {
            s.slope_mb_per_min = s.slope_mb_per_min.min(15.0);
            s.growth_mb = s.growth_mb.min(40.0);
            s.interval_secs = s.interval_secs.min(4);
            s.high_pct = s.high_pct.min(88.0);
            s.low_pct = s.low_pct.min(83.0);
            s.leak_threshold_pct = s.leak_threshold_pct.min(80.0);
        } else if ram_gib >= 64.0 {
            s.interval_secs = s.interval_secs.max(8);
            s.grace_secs = s.grace_secs.max(90);
        }

        if self.cpu_count <= 4 {
            s.interval_secs = s.interval_secs.max(6);
        }

        info!(
            "System: {:.1}GB RAM, {} CPUs",
            ram_gib, self.cpu_count
        );
        info!(
            "Tuned params: slope={}MB/min, growth={}MB, interval={}s, high={}%, low={}%",
            s.slope_mb_per_min, s.growth_mb, s.interval_secs, s.high_pct, s.low_pct
        );
    }
}
