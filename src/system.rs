//! System-wide memory and host profile from the /proc filesystem.
//!
//! This module reads total and available memory from /proc/meminfo, the boot
//! time from /proc/stat and the online CPU count via sysconf.

use herakles_leak_guard::{SystemProfile, SystemUsage};
use std::fs;
use std::path::Path;

/// Total and available memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemInfo {
    /// Used memory as a percentage of total.
    pub fn usage_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 * 100.0 / self.total_bytes as f64
    }
}

fn parse_kb_value(line: &str) -> Option<u64> {
    line.split_whitespace().nth(1)?.parse::<u64>().ok().map(|kb| kb * 1024)
}

/// Parses the MemTotal and MemAvailable lines of /proc/meminfo.
///
/// Kernels without MemAvailable (pre 3.14) fall back to MemFree + Buffers + Cached.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, String> {
    let mut total: Option<u64> = None;
    let mut available: Option<u64> = None;
    let mut free_estimate: u64 = 0;

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total = parse_kb_value(line);
        } else if line.starts_with("MemAvailable:") {
            available = parse_kb_value(line);
        } else if line.starts_with("MemFree:") || line.starts_with("Buffers:") || line.starts_with("Cached:") {
            free_estimate += parse_kb_value(line).unwrap_or(0);
        }
    }

    let total_bytes = total.ok_or_else(|| "MemTotal not found in meminfo".to_string())?;
    Ok(MemInfo {
        total_bytes,
        available_bytes: available.unwrap_or(free_estimate).min(total_bytes),
    })
}

/// Reads memory information from `<proc_root>/meminfo`.
pub fn read_meminfo(proc_root: &Path) -> Result<MemInfo, String> {
    let path = proc_root.join("meminfo");
    let content = fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_meminfo(&content)
}

/// Current usage snapshot for the engine.
pub fn read_system_usage(proc_root: &Path) -> Result<SystemUsage, String> {
    let mem = read_meminfo(proc_root)?;
    Ok(SystemUsage {
        usage_pct: mem.usage_pct(),
        total_bytes: mem.total_bytes,
    })
}

/// Reads the system boot time (Unix seconds) from the `btime` line of `<proc_root>/stat`.
pub fn read_boot_time(proc_root: &Path) -> Result<u64, String> {
    let path = proc_root.join("stat");
    let content = fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| "btime not found in /proc/stat".to_string())
}

/// Number of online logical CPUs.
pub fn cpu_count() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_NPROCESSORS_ONLN
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if n > 0 {
            return n as usize;
        }
    }
    1
}

/// Takes the static host profile used for auto tuning.
pub fn detect_profile(proc_root: &Path) -> Result<SystemProfile, String> {
    let mem = read_meminfo(proc_root)?;
    Ok(SystemProfile::new(mem.total_bytes, cpu_count()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MEMINFO: &str = "MemTotal:       16384000 kB\n\
                           MemFree:         1000000 kB\n\
                           MemAvailable:    4096000 kB\n\
                           Buffers:          200000 kB\n\
                           Cached:          3000000 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let mem = parse_meminfo(MEMINFO).expect("parse");
        assert_eq!(mem.total_bytes, 16_384_000 * 1024);
        assert_eq!(mem.available_bytes, 4_096_000 * 1024);
        assert!((mem.usage_pct() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let content = "MemTotal: 1000 kB\nMemFree: 100 kB\nBuffers: 50 kB\nCached: 100 kB\n";
        let mem = parse_meminfo(content).expect("parse");
        assert_eq!(mem.available_bytes, 250 * 1024);
    }

    #[test]
    fn test_parse_meminfo_missing_total() {
        assert!(parse_meminfo("MemFree: 100 kB\n").is_err());
    }

    #[test]
    fn test_read_from_fake_proc() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("meminfo"), MEMINFO).expect("write meminfo");
        fs::write(dir.path().join("stat"), "cpu  1 2 3 4\nbtime 1700000000\nprocesses 42\n").expect("write stat");

        let usage = read_system_usage(dir.path()).expect("usage");
        assert!((usage.usage_pct - 75.0).abs() < 1e-9);
        assert_eq!(read_boot_time(dir.path()).expect("btime"), 1_700_000_000);

        let profile = detect_profile(dir.path()).expect("profile");
        assert_eq!(profile.total_memory_bytes, 16_384_000 * 1024);
        assert!(profile.cpu_count >= 1);
    }

    #[test]
    fn test_cpu_count_positive() {
        assert!(cpu_count() >= 1);
    }
}
