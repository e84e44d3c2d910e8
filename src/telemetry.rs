//! Snapshot types consumed by the engine and the collaborator traits it calls.
//!
//! The engine never touches `/proc`, signals or the docker CLI directly. The
//! binary plugs Linux implementations of these traits in; tests plug scripted
//! fakes in.

use crate::error::{TelemetryError, TerminateError};

/// One process as seen in a single scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub parent_pid: u32,
    pub parent_name: String,
    /// Unix seconds at which the process was started
    pub start_time: f64,
    pub memory_bytes: u64,
    /// Number of descendant processes (recursive)
    pub child_count: usize,
    /// Names of all ancestors, nearest first
    pub ancestry: Vec<String>,
}

/// One container as reported by the container runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSnapshot {
    pub id: String,
    pub name: String,
    pub memory_bytes: u64,
}

/// System-wide memory usage at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemUsage {
    pub usage_pct: f64,
    pub total_bytes: u64,
}

/// Identity of a tracked entity.
///
/// Processes are keyed by pid *and* start time so that a recycled pid never
/// inherits the history of an unrelated earlier process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Process { pid: u32, start_ms: u64 },
    Container(String),
}

impl EntityKey {
    pub fn process(pid: u32, start_time: f64) -> Self {
        EntityKey::Process {
            pid,
            start_ms: (start_time.max(0.0) * 1000.0).round() as u64,
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKey::Process { pid, .. } => write!(f, "pid {}", pid),
            EntityKey::Container(id) => write!(f, "container {}", id),
        }
    }
}

/// Something the engine may terminate.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Process(ProcessSnapshot),
    Container(ContainerSnapshot),
}

impl Target {
    pub fn key(&self) -> EntityKey {
        match self {
            Target::Process(p) => EntityKey::process(p.pid, p.start_time),
            Target::Container(c) => EntityKey::Container(c.id.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Target::Process(p) => &p.name,
            Target::Container(c) => &c.name,
        }
    }

    pub fn memory_bytes(&self) -> u64 {
        match self {
            Target::Process(p) => p.memory_bytes,
            Target::Container(c) => c.memory_bytes,
        }
    }

    /// Key under which repeated kills are counted.
    pub fn recidivism_key(&self) -> (String, String) {
        match self {
            Target::Process(p) => (p.name.clone(), p.parent_name.clone()),
            Target::Container(c) => (format!("docker:{}", c.name), "docker".to_string()),
        }
    }

    /// Human readable label used in log lines.
    pub fn describe(&self) -> String {
        match self {
            Target::Process(p) => format!("PID {} ({}) parent={}", p.pid, p.name, p.parent_name),
            Target::Container(c) => format!("container {} ({})", c.id, c.name),
        }
    }
}

/// Provider of per-cycle snapshots.
pub trait TelemetrySource: Send {
    fn processes(&mut self) -> Result<Vec<ProcessSnapshot>, TelemetryError>;

    fn containers(&mut self) -> Result<Vec<ContainerSnapshot>, TelemetryError>;

    fn system_usage(&mut self) -> Result<SystemUsage, TelemetryError>;
}

/// Two-phase stop (graceful, bounded wait, forceful) of one target.
pub trait Terminator: Send {
    fn terminate(&mut self, target: &Target) -> Result<(), TerminateError>;
}

/// Best-effort user alert. Implementations swallow their own failures.
pub trait Notifier: Send {
    fn notify(&self, title: &str, message: &str);
}

/// Append-only audit trail of engine decisions.
pub trait EventLog: Send {
    fn log_event(&self, message: &str);
}
