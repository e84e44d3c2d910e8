//! Process table reading from /proc.
//!
//! This module provides:
//! - `stat`: parsing of /proc/<pid>/stat
//! - `scanner`: process discovery and snapshot building

pub mod scanner;
pub mod stat;

// Re-export commonly used types
pub use scanner::{collect_proc_entries, scan_processes};
pub use stat::read_stat;
