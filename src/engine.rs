//! The decision engine.
//!
//! One [`Engine::run_cycle`] call performs a full monitoring pass:
//!
//! 1. sample system usage and retune the dynamic thresholds,
//! 2. feed every eligible process (and container) into its tracker and
//!    evaluate the leak state machine, killing critical threats and confirmed
//!    leaks as mode allows,
//! 3. drop trackers of entities that disappeared,
//! 4. run pressure relief while usage is at or above the high-water mark,
//! 5. count every successful kill towards recidivism and escalate repeat
//!    offenders.
//!
//! All state lives in the engine value itself; the caller is responsible for
//! never running two cycles at once.

use ahash::AHashSet as HashSet;
use tracing::{debug, info, warn};

use crate::classifier::{self, Verdict};
use crate::clock::Clock;
use crate::dynamic::DynamicParams;
use crate::error::{ConfigError, TelemetryError, TerminateError};
use crate::profile::SystemProfile;
use crate::ranker::{self, Candidate};
use crate::recidivism::{Escalation, RecidivismTracker};
use crate::regression::bytes_per_sec_to_mb_per_min;
use crate::settings::{Mode, Settings, MB};
use crate::telemetry::{
    ContainerSnapshot, EntityKey, EventLog, Notifier, ProcessSnapshot, Target, TelemetrySource, Terminator,
};
use crate::threat;
use crate::tracker::TrackerRegistry;

/// Why an entity was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    /// Confirmed leak
    Leak,
    /// Projected to exhaust memory before confirmation could complete
    CriticalLeak,
    /// Chosen by pressure relief
    Pressure,
}

impl std::fmt::Display for KillReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KillReason::Leak => write!(f, "leak"),
            KillReason::CriticalLeak => write!(f, "critical-leak"),
            KillReason::Pressure => write!(f, "pressure"),
        }
    }
}

/// A successful termination.
#[derive(Debug, Clone, PartialEq)]
pub struct Kill {
    pub key: EntityKey,
    pub name: String,
    pub reason: KillReason,
}

/// How a pressure-relief pass ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReliefOutcome {
    /// Usage dropped to or below the low-water mark
    Relieved { kills: usize, usage_pct: f64 },
    /// Ran out of candidates with usage still above the low-water mark
    Exhausted { kills: usize, usage_pct: f64 },
}

/// Summary of one monitoring cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Usage read at the start of the cycle
    pub usage_pct: f64,
    pub params_adjusted: bool,
    /// Trackers alive at the end of the cycle
    pub tracked: usize,
    pub kills: Vec<Kill>,
    /// Confirmed leaks spared because protection mode saw too little pressure
    pub spared: Vec<EntityKey>,
    /// Terminations that were denied or failed
    pub failed: Vec<EntityKey>,
    pub pruned: usize,
    pub relief: Option<ReliefOutcome>,
    pub escalations: Vec<Escalation>,
}

/// Everything the engine calls out to.
pub struct Collaborators {
    pub clock: Box<dyn Clock>,
    pub telemetry: Box<dyn TelemetrySource>,
    pub terminator: Box<dyn Terminator>,
    pub notifier: Box<dyn Notifier>,
    pub event_log: Box<dyn EventLog>,
}

enum KillOutcome {
    Killed,
    Vanished,
    Failed,
}

pub struct Engine {
    settings: Settings,
    profile: SystemProfile,
    params: DynamicParams,
    registry: TrackerRegistry,
    recidivism: RecidivismTracker,
    containers_enabled: bool,
    clock: Box<dyn Clock>,
    telemetry: Box<dyn TelemetrySource>,
    terminator: Box<dyn Terminator>,
    notifier: Box<dyn Notifier>,
    event_log: Box<dyn EventLog>,
}

impl Engine {
    /// Validates `settings` and builds an engine with empty state.
    pub fn new(settings: Settings, profile: SystemProfile, collab: Collaborators) -> Result<Self, ConfigError> {
        settings.validate()?;

        let params = DynamicParams::from_settings(&settings);
        let registry = TrackerRegistry::new(settings.history_len);
        let recidivism = RecidivismTracker::new(settings.notify_threshold, settings.notify_window_secs as f64);
        let containers_enabled = settings.containers;

        Ok(Self {
            settings,
            profile,
            params,
            registry,
            recidivism,
            containers_enabled,
            clock: collab.clock,
            telemetry: collab.telemetry,
            terminator: collab.terminator,
            notifier: collab.notifier,
            event_log: collab.event_log,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn params(&self) -> &DynamicParams {
        &self.params
    }

    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    pub fn containers_enabled(&self) -> bool {
        self.containers_enabled
    }

    /// Logs the startup line to the event log.
    pub fn announce(&self, version: &str) {
        let s = &self.settings;
        self.event_log.log_event(&format!(
            "Leak guard v{} - monitoring started in {} mode with params: slope={}MB/min, growth={}MB, interval={}s",
            version, s.mode, s.slope_mb_per_min, s.growth_mb, s.interval_secs
        ));
        if s.mode == Mode::Protection {
            self.event_log.log_event(&format!(
                "Protection mode: will only kill leaks when RAM >= {}%",
                s.leak_threshold_pct
            ));
        }
        if self.containers_enabled {
            self.event_log.log_event("Docker container monitoring enabled");
        }
    }

    /// Runs one full monitoring pass.
    ///
    /// Fails only if system usage or the process list cannot be read at all;
    /// the caller should log and try again next interval.
    pub fn run_cycle(&mut self) -> Result<CycleReport, TelemetryError> {
        let now = self.clock.now();
        let usage = self.telemetry.system_usage()?;
        let total_bytes = if usage.total_bytes > 0 {
            usage.total_bytes
        } else {
            self.profile.total_memory_bytes
        };

        let mut report = CycleReport {
            usage_pct: usage.usage_pct,
            params_adjusted: self.params.adjust_for_pressure(usage.usage_pct, now),
            ..CycleReport::default()
        };

        let processes: Vec<ProcessSnapshot> = self
            .telemetry
            .processes()?
            .into_iter()
            .filter(|p| self.is_eligible(p))
            .collect();

        let mut seen: HashSet<EntityKey> = HashSet::with_capacity(processes.len());
        let mut killed: HashSet<EntityKey> = HashSet::new();

        for proc in &processes {
            let key = EntityKey::process(proc.pid, proc.start_time);
            seen.insert(key.clone());

            if now - proc.start_time < self.settings.grace_secs as f64 {
                continue;
            }
            let target = Target::Process(proc.clone());
            self.observe(target, key, now, usage.usage_pct, total_bytes, &mut killed, &mut report);
        }

        let containers = self.poll_containers();
        if let Some(list) = &containers {
            for c in list {
                let key = EntityKey::Container(c.id.clone());
                seen.insert(key.clone());
                let target = Target::Container(c.clone());
                self.observe(target, key, now, usage.usage_pct, total_bytes, &mut killed, &mut report);
            }
        }

        // A failed container read says nothing about which containers exist.
        let containers_known = containers.is_some() || !self.containers_enabled;
        report.pruned = self.registry.retain(|k| match k {
            EntityKey::Process { .. } => seen.contains(k),
            EntityKey::Container(_) => !containers_known || seen.contains(k),
        });
        if report.pruned > 0 {
            debug!("Pruned {} tracker(s) of vanished entities", report.pruned);
        }

        // Kills above may already have freed enough memory.
        let current_pct = match self.telemetry.system_usage() {
            Ok(u) => u.usage_pct,
            Err(e) => {
                warn!("Could not re-sample memory usage: {}", e);
                usage.usage_pct
            }
        };

        if current_pct >= self.settings.high_pct {
            let container_list = containers.unwrap_or_default();
            let outcome = self.relieve_pressure(current_pct, now, &processes, &container_list, &killed, &mut report);
            report.relief = Some(outcome);
        }

        report.tracked = self.registry.len();
        Ok(report)
    }

    fn is_eligible(&self, proc: &ProcessSnapshot) -> bool {
        if self.settings.whitelist.iter().any(|w| w == &proc.name) {
            return false;
        }
        if self.settings.scope_restricted {
            return proc.ancestry.iter().any(|ancestor| {
                self.settings
                    .scope_ancestors
                    .iter()
                    .any(|prefix| ancestor.starts_with(prefix.as_str()))
            });
        }
        true
    }

    /// Returns the container list, or `None` when containers are disabled or
    /// the read failed this cycle.
    fn poll_containers(&mut self) -> Option<Vec<ContainerSnapshot>> {
        if !self.containers_enabled {
            return None;
        }
        match self.telemetry.containers() {
            Ok(list) => Some(list),
            Err(TelemetryError::Unavailable(msg)) => {
                warn!("Container monitoring disabled for this run: {}", msg);
                self.event_log
                    .log_event(&format!("Container monitoring disabled: {}", msg));
                self.containers_enabled = false;
                None
            }
            Err(e) => {
                warn!("Skipping containers this cycle: {}", e);
                None
            }
        }
    }

    /// Records a sample for one entity, evaluates it and kills it if warranted.
    #[allow(clippy::too_many_arguments)]
    fn observe(
        &mut self,
        target: Target,
        key: EntityKey,
        now: f64,
        usage_pct: f64,
        total_bytes: u64,
        killed: &mut HashSet<EntityKey>,
        report: &mut CycleReport,
    ) {
        let trk = self.registry.record(&key, now, target.memory_bytes());
        let verdict = classifier::evaluate(
            trk,
            &self.params,
            self.settings.monotonic_ratio,
            self.settings.cooldown_secs as f64,
            now,
        );

        let reason = match verdict {
            Verdict::Filling | Verdict::Cooldown => None,
            _ if threat::is_critical_threat(trk, usage_pct, total_bytes) => Some(KillReason::CriticalLeak),
            Verdict::Confirmed(_) => {
                if self.settings.mode == Mode::Hunting || usage_pct >= self.settings.leak_threshold_pct {
                    Some(KillReason::Leak)
                } else {
                    self.event_log.log_event(&format!(
                        "Leak detected but not killed (protection mode, RAM {:.1}%): {} rss={:.1}MB slope~{:.1}MB/min",
                        usage_pct,
                        target.describe(),
                        target.memory_bytes() as f64 / MB,
                        bytes_per_sec_to_mb_per_min(trk.growth_rate)
                    ));
                    report.spared.push(key.clone());
                    None
                }
            }
            Verdict::Suspect(n) => {
                debug!("{} suspect {}/{}", target.describe(), n, self.params.current_confirmations);
                None
            }
            Verdict::Clean | Verdict::Plateaued => None,
        };

        let Some(reason) = reason else {
            return;
        };
        let slope = bytes_per_sec_to_mb_per_min(trk.growth_rate);
        match self.kill(&target, reason, slope, now, report) {
            KillOutcome::Killed => {
                killed.insert(key);
            }
            KillOutcome::Vanished => {
                self.registry.remove(&key);
            }
            KillOutcome::Failed => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn relieve_pressure(
        &mut self,
        usage_pct: f64,
        now: f64,
        processes: &[ProcessSnapshot],
        containers: &[ContainerSnapshot],
        killed: &HashSet<EntityKey>,
        report: &mut CycleReport,
    ) -> ReliefOutcome {
        info!(
            "RAM {:.1}% >= {}%, relieving pressure",
            usage_pct, self.settings.high_pct
        );
        self.event_log
            .log_event(&format!("Pressure {:.1}%: starting relief", usage_pct));

        let targets = processes
            .iter()
            .cloned()
            .map(Target::Process)
            .chain(containers.iter().cloned().map(Target::Container));

        let mut candidates: Vec<Candidate> = Vec::new();
        for target in targets {
            let key = target.key();
            if killed.contains(&key) {
                continue;
            }
            let trk = self.registry.get(&key);
            if trk.map(|t| t.in_cooldown(now)).unwrap_or(false) {
                continue;
            }
            candidates.push(ranker::build_candidate(
                target,
                trk,
                &self.settings.weights,
                self.settings.recent_secs as f64,
                now,
            ));
        }

        let mut current = usage_pct;
        let mut kills = 0;
        for cand in ranker::rank(candidates) {
            if current <= self.settings.low_pct {
                break;
            }
            debug!("Relief candidate {} score={:.2}", cand.target.describe(), cand.score);
            match self.kill(&cand.target, KillReason::Pressure, cand.slope_mb_per_min, now, report) {
                KillOutcome::Killed => kills += 1,
                KillOutcome::Vanished => {
                    self.registry.remove(&cand.target.key());
                    continue;
                }
                KillOutcome::Failed => continue,
            }

            match self.telemetry.system_usage() {
                Ok(u) => current = u.usage_pct,
                Err(e) => warn!("Could not re-sample memory usage: {}", e),
            }
        }

        if current <= self.settings.low_pct {
            info!("RAM now {:.1}% <= {}%", current, self.settings.low_pct);
            return ReliefOutcome::Relieved { kills, usage_pct: current };
        }
        warn!("Pressure persists at {:.1}%, no remaining candidates", current);
        ReliefOutcome::Exhausted { kills, usage_pct: current }
    }

    /// Terminates one target and does the bookkeeping for a successful kill.
    fn kill(&mut self, target: &Target, reason: KillReason, slope_mb_min: f64, now: f64, report: &mut CycleReport) -> KillOutcome {
        let key = target.key();
        match self.terminator.terminate(target) {
            Ok(()) => {
                let msg = match target {
                    Target::Process(_) => format!(
                        "Killed {} rss={:.1} MB, slope~{:.1} MB/min, reason={}",
                        target.describe(),
                        target.memory_bytes() as f64 / MB,
                        slope_mb_min,
                        reason
                    ),
                    Target::Container(_) => format!("Killed Docker {}, reason={}", target.describe(), reason),
                };
                info!("[{}] {}", reason.to_string().to_uppercase(), msg);
                self.event_log.log_event(&msg);

                self.registry.remove(&key);
                report.kills.push(Kill {
                    key,
                    name: target.name().to_string(),
                    reason,
                });

                if let Some(esc) = self.recidivism.record(target.recidivism_key(), now) {
                    self.escalate(target, &esc);
                    report.escalations.push(esc);
                }
                KillOutcome::Killed
            }
            Err(TerminateError::Vanished) => {
                debug!("{} vanished before termination", target.describe());
                KillOutcome::Vanished
            }
            Err(e) => {
                warn!("Failed to terminate {}: {}", target.describe(), e);
                self.event_log
                    .log_event(&format!("Failed to kill {}: {}", target.describe(), e));
                report.failed.push(key);
                KillOutcome::Failed
            }
        }
    }

    fn escalate(&self, target: &Target, esc: &Escalation) {
        let minutes = self.settings.notify_window_secs / 60;
        let (title, body) = match target {
            Target::Process(_) => (
                "Memory Leak Killer",
                format!(
                    "{} (parent: {}) was killed {}x in the last {} minutes.",
                    esc.name, esc.parent, esc.count, minutes
                ),
            ),
            Target::Container(c) => (
                "Docker Container Memory Leak",
                format!("Container {} killed {}x in {} minutes", c.name, esc.count, minutes),
            ),
        };
        warn!("Repeat offender: {}", body);
        self.notifier.notify(title, &body);
    }
}
