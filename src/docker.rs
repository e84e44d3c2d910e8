//! Docker CLI integration: container memory telemetry and container stop.

use herakles_leak_guard::{ContainerSnapshot, TelemetryError, TerminateError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

use crate::exec::run_with_timeout;

const STATS_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_TIMEOUT: Duration = Duration::from_secs(15);
const STOP_GRACE_SECS: &str = "10";

static MEMORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]+)").expect("valid regex"));

/// One line of `docker stats --format '{{json .}}'`. Other keys are ignored.
#[derive(Debug, Deserialize)]
struct StatsLine {
    #[serde(rename = "Container", default)]
    container: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
}

/// Parses a docker memory string such as `1.5GiB` into bytes.
///
/// Returns 0 for strings that do not start with a number and a unit; unknown
/// units count as bytes.
pub fn parse_memory_string(s: &str) -> u64 {
    let Some(caps) = MEMORY_RE.captures(s) else {
        return 0;
    };
    let value: f64 = caps[1].parse().unwrap_or(0.0);
    let multiplier: f64 = match caps[2].to_ascii_uppercase().as_str() {
        "KB" | "KIB" => 1024.0,
        "MB" | "MIB" => 1024.0 * 1024.0,
        "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TIB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    (value * multiplier) as u64
}

/// Parses the full output of `docker stats`. Malformed lines are skipped.
pub fn parse_stats_output(output: &str) -> Vec<ContainerSnapshot> {
    let mut out = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: StatsLine = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping malformed docker stats line: {}", e);
                continue;
            }
        };
        if parsed.container.is_empty() {
            continue;
        }
        let id: String = parsed.container.chars().take(12).collect();
        let Some((current, _limit)) = parsed.mem_usage.split_once(" / ") else {
            continue;
        };
        let name = if parsed.name.is_empty() { id.clone() } else { parsed.name };
        out.push(ContainerSnapshot {
            id,
            name,
            memory_bytes: parse_memory_string(current),
        });
    }
    out
}

/// Thin wrapper around the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// Current memory usage of all running containers.
    pub fn stats(&self) -> Result<Vec<ContainerSnapshot>, TelemetryError> {
        let output = run_with_timeout(
            &self.program,
            &["stats", "--no-stream", "--format", "{{json .}}"],
            STATS_TIMEOUT,
        )
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TelemetryError::Unavailable(format!("{} not found", self.program)),
            _ => TelemetryError::Failed(e.to_string()),
        })?;

        if !output.status.success() {
            // 127: shell could not find the command
            if output.status.code() == Some(127) {
                return Err(TelemetryError::Unavailable(format!("{} not found", self.program)));
            }
            return Err(TelemetryError::Failed(format!(
                "docker stats exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_stats_output(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Stops a container (graceful stop with a 10 s grace, then docker kills it).
    pub fn stop(&self, id: &str) -> Result<(), TerminateError> {
        let output = run_with_timeout(&self.program, &["stop", "-t", STOP_GRACE_SECS, id], STOP_TIMEOUT)
            .map_err(|e| TerminateError::Failed(e.to_string()))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such container") {
            return Err(TerminateError::Vanished);
        }
        if stderr.contains("permission denied") {
            return Err(TerminateError::Denied(stderr.trim().to_string()));
        }
        warn!("docker stop {} failed: {}", id, stderr.trim());
        Err(TerminateError::Failed(stderr.trim().to_string()))
    }
}
