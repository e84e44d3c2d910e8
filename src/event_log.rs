//! Append-only event log file with size-based rotation.

use chrono::Local;
use herakles_leak_guard::EventLog;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rotate once the log grows beyond this many bytes.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 50 * 1024 * 1024;

/// Writes `[timestamp] message` lines, moving the file to `<name>.old` when full.
#[derive(Debug, Clone)]
pub struct FileEventLog {
    path: PathBuf,
    max_bytes: u64,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".old");
        PathBuf::from(name)
    }

    fn rotate_if_needed(&self) -> std::io::Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() > self.max_bytes => fs::rename(&self.path, self.rotated_path()),
            _ => Ok(()),
        }
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
    }
}

impl EventLog for FileEventLog {
    fn log_event(&self, message: &str) {
        if let Err(e) = self.append(message) {
            debug!("Event log write to {} failed: {}", self.path.display(), e);
        }
    }
}
