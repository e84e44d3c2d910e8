//! Process scanning utilities for discovering and reading process entries from /proc.
//!
//! Every numeric directory under the proc root is parsed in parallel; the
//! resulting table is then joined on ppid to fill in parent names, ancestry
//! and recursive descendant counts.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use herakles_leak_guard::ProcessSnapshot;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::stat::{read_stat, StatFields};

/// Process entry representing a directory in /proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Guards against ppid cycles in a corrupted or racing snapshot.
const MAX_ANCESTRY_DEPTH: usize = 64;

/// Scans the proc root for process entries with numeric PIDs.
pub fn collect_proc_entries(root: &Path) -> Vec<ProcEntry> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let p = entry.path();
            let name = match p.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            let pid: u32 = match name.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            out.push(ProcEntry { pid, proc_path: p });
        }
    }
    out
}

/// Reads every process under `root` and returns snapshots for the engine.
///
/// Processes that vanish or have unparsable stat files are skipped, as are
/// zero-RSS entries (kernel threads, zombies) and `self_pid`.
pub fn scan_processes(root: &Path, boot_time: u64, self_pid: u32) -> Vec<ProcessSnapshot> {
    let entries = collect_proc_entries(root);

    let stats: Vec<(u32, StatFields)> = entries
        .par_iter()
        .filter_map(|e| match read_stat(&e.proc_path) {
            Ok(f) => Some((e.pid, f)),
            Err(err) => {
                debug!("Skipping pid {}: {}", e.pid, err);
                None
            }
        })
        .collect();

    build_snapshots(stats, boot_time, self_pid)
}

/// Joins raw stat records into snapshots with parent, ancestry and child data.
pub fn build_snapshots(stats: Vec<(u32, StatFields)>, boot_time: u64, self_pid: u32) -> Vec<ProcessSnapshot> {
    let by_pid: HashMap<u32, &StatFields> = stats.iter().map(|(pid, f)| (*pid, f)).collect();

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, f) in &stats {
        if f.ppid != *pid {
            children.entry(f.ppid).or_default().push(*pid);
        }
    }

    let mut out = Vec::with_capacity(stats.len());
    for (pid, f) in &stats {
        if *pid == self_pid || f.rss_pages == 0 {
            continue;
        }

        let mut ancestry = Vec::new();
        let mut cur = f.ppid;
        while cur != 0 && ancestry.len() < MAX_ANCESTRY_DEPTH {
            match by_pid.get(&cur) {
                Some(parent) => {
                    ancestry.push(parent.name.clone());
                    if parent.ppid == cur {
                        break;
                    }
                    cur = parent.ppid;
                }
                None => break,
            }
        }

        out.push(ProcessSnapshot {
            pid: *pid,
            name: f.name.clone(),
            parent_pid: f.ppid,
            parent_name: ancestry.first().cloned().unwrap_or_else(|| "-".to_string()),
            start_time: f.start_time(boot_time),
            memory_bytes: f.rss_bytes(),
            child_count: count_descendants(*pid, &children),
            ancestry,
        });
    }
    out
}

fn count_descendants(pid: u32, children: &HashMap<u32, Vec<u32>>) -> usize {
    let mut seen: HashSet<u32> = HashSet::new();
    let mut stack: Vec<u32> = children.get(&pid).cloned().unwrap_or_default();
    while let Some(child) = stack.pop() {
        if child == pid || !seen.insert(child) {
            continue;
        }
        if let Some(grand) = children.get(&child) {
            stack.extend(grand.iter().copied());
        }
    }
    seen.len()
}
