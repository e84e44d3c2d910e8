//! Parsing of `/proc/<pid>/stat`.
//!
//! The command name (field 2) is wrapped in parentheses and may itself contain
//! spaces or parentheses, so fields are split after the *last* `)`.

use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    100.0
}

fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// System clock ticks per second (for start time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes (for RSS calculation).
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Fields of `/proc/<pid>/stat` the guard needs.
#[derive(Debug, Clone, PartialEq)]
pub struct StatFields {
    pub name: String,
    pub state: char,
    pub ppid: u32,
    /// Start time in clock ticks since boot (field 22)
    pub start_ticks: u64,
    /// Resident set size in pages (field 24)
    pub rss_pages: u64,
}

impl StatFields {
    /// Start time as Unix seconds given the boot time.
    pub fn start_time(&self, boot_time: u64) -> f64 {
        boot_time as f64 + self.start_ticks as f64 / *CLK_TCK
    }

    pub fn rss_bytes(&self) -> u64 {
        self.rss_pages * *PAGE_SIZE
    }
}

/// Parses the content of a stat file.
pub fn parse_stat(content: &str) -> Result<StatFields, String> {
    let open = content.find('(').ok_or("missing '(' in stat")?;
    let close = content.rfind(')').ok_or("missing ')' in stat")?;
    if close < open {
        return Err("malformed comm field in stat".into());
    }
    let name = content[open + 1..close].to_string();

    // Fields after the comm start at field 3 (state)
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if rest.len() < 22 {
        return Err(format!("stat has {} fields after comm, expected at least 22", rest.len()));
    }

    let state = rest[0].chars().next().unwrap_or('?');
    let ppid = rest[1].parse::<u32>().map_err(|e| format!("bad ppid: {}", e))?;
    let start_ticks = rest[19].parse::<u64>().map_err(|e| format!("bad starttime: {}", e))?;
    let rss_pages = rest[21].parse::<i64>().map_err(|e| format!("bad rss: {}", e))?.max(0) as u64;

    Ok(StatFields {
        name,
        state,
        ppid,
        start_ticks,
        rss_pages,
    })
}

/// Reads and parses `<proc_path>/stat`.
pub fn read_stat(proc_path: &Path) -> Result<StatFields, String> {
    let content = fs::read_to_string(proc_path.join("stat")).map_err(|e| e.to_string())?;
    parse_stat(&content)
}
