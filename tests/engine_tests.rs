//! End-to-end engine scenarios driven by a scripted host and a manual clock.

use herakles_leak_guard::{
    Clock, Collaborators, ContainerSnapshot, CycleReport, Engine, EntityKey, EventLog, KillReason, ManualClock, Mode,
    Notifier, ProcessSnapshot, ReliefOutcome, Settings, SystemProfile, SystemUsage, Target, TelemetryError,
    TelemetrySource, TerminateError, Terminator,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const MB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MB;
const T0: f64 = 10_000.0;
const INTERVAL: f64 = 5.0;

enum ContainerFeed {
    List(Vec<ContainerSnapshot>),
    Unavailable,
    Failed,
}

struct World {
    usage_pct: f64,
    total_bytes: u64,
    /// Usage drop applied by every successful termination
    drop_per_kill: f64,
    fail_usage: bool,
    processes: Vec<ProcessSnapshot>,
    containers: ContainerFeed,
    container_polls: usize,
    deny: HashSet<String>,
    vanish: HashSet<String>,
    terminated: Vec<String>,
    notifications: Vec<(String, String)>,
    events: Vec<String>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            usage_pct: 50.0,
            total_bytes: 16 * GIB,
            drop_per_kill: 0.0,
            fail_usage: false,
            processes: Vec::new(),
            containers: ContainerFeed::List(Vec::new()),
            container_polls: 0,
            deny: HashSet::new(),
            vanish: HashSet::new(),
            terminated: Vec::new(),
            notifications: Vec::new(),
            events: Vec::new(),
        }
    }
}

type Shared = Arc<Mutex<World>>;

struct FakeTelemetry(Shared);
struct FakeTerminator(Shared);
struct FakeNotifier(Shared);
struct FakeEventLog(Shared);

impl TelemetrySource for FakeTelemetry {
    fn processes(&mut self) -> Result<Vec<ProcessSnapshot>, TelemetryError> {
        Ok(self.0.lock().unwrap().processes.clone())
    }

    fn containers(&mut self) -> Result<Vec<ContainerSnapshot>, TelemetryError> {
        let mut w = self.0.lock().unwrap();
        w.container_polls += 1;
        match &w.containers {
            ContainerFeed::List(list) => Ok(list.clone()),
            ContainerFeed::Unavailable => Err(TelemetryError::Unavailable("docker not found".into())),
            ContainerFeed::Failed => Err(TelemetryError::Failed("daemon timeout".into())),
        }
    }

    fn system_usage(&mut self) -> Result<SystemUsage, TelemetryError> {
        let w = self.0.lock().unwrap();
        if w.fail_usage {
            return Err(TelemetryError::Failed("meminfo unreadable".into()));
        }
        Ok(SystemUsage {
            usage_pct: w.usage_pct,
            total_bytes: w.total_bytes,
        })
    }
}

impl Terminator for FakeTerminator {
    fn terminate(&mut self, target: &Target) -> Result<(), TerminateError> {
        let mut w = self.0.lock().unwrap();
        let name = target.name().to_string();
        if w.vanish.contains(&name) {
            return Err(TerminateError::Vanished);
        }
        if w.deny.contains(&name) {
            return Err(TerminateError::Denied("operation not permitted".into()));
        }
        match target {
            Target::Process(p) => w.processes.retain(|q| q.pid != p.pid),
            Target::Container(c) => {
                if let ContainerFeed::List(list) = &mut w.containers {
                    list.retain(|d| d.id != c.id);
                }
            }
        }
        w.usage_pct -= w.drop_per_kill;
        w.terminated.push(name);
        Ok(())
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.0
            .lock()
            .unwrap()
            .notifications
            .push((title.to_string(), message.to_string()));
    }
}

impl EventLog for FakeEventLog {
    fn log_event(&self, message: &str) {
        self.0.lock().unwrap().events.push(message.to_string());
    }
}

fn base_settings() -> Settings {
    Settings {
        whitelist: vec!["sshd".to_string()],
        ..Settings::default()
    }
}

fn proc(pid: u32, name: &str, start_time: f64, memory_mb: u64) -> ProcessSnapshot {
    ProcessSnapshot {
        pid,
        name: name.to_string(),
        parent_pid: 1,
        parent_name: "bash".to_string(),
        start_time,
        memory_bytes: memory_mb * MB,
        child_count: 0,
        ancestry: vec!["bash".to_string(), "systemd".to_string()],
    }
}

fn harness(settings: Settings, world: World) -> (Engine, Shared, ManualClock) {
    let shared = Arc::new(Mutex::new(world));
    let clock = ManualClock::new(T0);
    let collab = Collaborators {
        clock: Box::new(clock.clone()),
        telemetry: Box::new(FakeTelemetry(shared.clone())),
        terminator: Box::new(FakeTerminator(shared.clone())),
        notifier: Box::new(FakeNotifier(shared.clone())),
        event_log: Box::new(FakeEventLog(shared.clone())),
    };
    let engine = Engine::new(settings, SystemProfile::new(16 * GIB, 8), collab).expect("valid settings");
    (engine, shared, clock)
}

fn set_memory(shared: &Shared, pid: u32, memory_mb: u64) {
    let mut w = shared.lock().unwrap();
    if let Some(p) = w.processes.iter_mut().find(|p| p.pid == pid) {
        p.memory_bytes = memory_mb * MB;
    }
}

/// Advances the clock by one interval after running a cycle.
fn cycle(engine: &mut Engine, clock: &ManualClock) -> CycleReport {
    let report = engine.run_cycle().expect("cycle succeeds");
    clock.advance(INTERVAL);
    report
}

#[test]
fn test_steady_leak_is_killed_on_seventh_sample() {
    let settings = Settings {
        mode: Mode::Hunting,
        ..base_settings()
    };
    let world = World {
        processes: vec![proc(100, "leaky", 0.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);
    let key = EntityKey::process(100, 0.0);

    for i in 0..6u64 {
        set_memory(&shared, 100, 100 + 12 * i);
        let report = cycle(&mut engine, &clock);
        assert!(report.kills.is_empty(), "premature kill at sample {}", i + 1);
    }
    assert_eq!(engine.registry().get(&key).map(|t| t.suspect_runs), Some(1));

    set_memory(&shared, 100, 100 + 12 * 6);
    let report = cycle(&mut engine, &clock);
    assert_eq!(report.kills.len(), 1);
    assert_eq!(report.kills[0].reason, KillReason::Leak);
    assert_eq!(report.kills[0].key, key);
    assert!(!engine.registry().contains(&key));

    let report = cycle(&mut engine, &clock);
    assert!(report.kills.is_empty());

    let w = shared.lock().unwrap();
    assert_eq!(w.terminated, vec!["leaky".to_string()]);
    assert!(w.events.iter().any(|e| e.starts_with("Killed PID 100 (leaky)") && e.contains("reason=leak")));
}

#[test]
fn test_relief_stops_once_below_low_water_mark() {
    let mut heavy = proc(1, "heavy", 0.0, 100);
    heavy.child_count = 3;
    let mut medium = proc(2, "medium", 0.0, 100);
    medium.child_count = 1;
    let world = World {
        usage_pct: 92.0,
        drop_per_kill: 10.0,
        processes: vec![heavy, medium, proc(3, "light", 0.0, 500)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(base_settings(), world);

    let report = cycle(&mut engine, &clock);
    assert_eq!(report.kills.len(), 1);
    assert_eq!(report.kills[0].name, "heavy");
    assert_eq!(report.kills[0].reason, KillReason::Pressure);
    match report.relief {
        Some(ReliefOutcome::Relieved { kills, usage_pct }) => {
            assert_eq!(kills, 1);
            assert!((usage_pct - 82.0).abs() < 1e-9);
        }
        other => panic!("expected relief, got {:?}", other),
    }
    assert_eq!(shared.lock().unwrap().processes.len(), 2);
}

#[test]
fn test_leak_kill_that_clears_high_water_mark_skips_relief() {
    // Lands between the marks, then below low
    for drop in [5.0, 12.0] {
        let settings = Settings {
            mode: Mode::Hunting,
            ..base_settings()
        };
        let world = World {
            drop_per_kill: drop,
            processes: vec![proc(100, "leaky", 0.0, 100), proc(200, "innocent", 0.0, 300)],
            ..World::default()
        };
        let (mut engine, shared, clock) = harness(settings, world);

        for i in 0..6u64 {
            set_memory(&shared, 100, 100 + 12 * i);
            cycle(&mut engine, &clock);
        }
        shared.lock().unwrap().usage_pct = 92.0;
        set_memory(&shared, 100, 100 + 12 * 6);
        let report = cycle(&mut engine, &clock);

        assert_eq!(report.kills.len(), 1, "drop {}", drop);
        assert_eq!(report.kills[0].name, "leaky");
        assert!(report.relief.is_none(), "drop {}: {:?}", drop, report.relief);
        let w = shared.lock().unwrap();
        assert_eq!(w.terminated, vec!["leaky".to_string()]);
        assert!(!w.events.iter().any(|e| e.contains("starting relief")));
    }
}

#[test]
fn test_relief_kills_in_descending_score_order() {
    let mut heavy = proc(1, "heavy", 0.0, 100);
    heavy.child_count = 3;
    let mut medium = proc(2, "medium", 0.0, 100);
    medium.child_count = 1;
    let world = World {
        usage_pct: 99.0,
        drop_per_kill: 1.0,
        processes: vec![proc(3, "light", 0.0, 500), medium, heavy],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(base_settings(), world);

    let report = cycle(&mut engine, &clock);
    let names: Vec<&str> = report.kills.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["heavy", "medium", "light"]);
    assert!(matches!(
        report.relief,
        Some(ReliefOutcome::Exhausted { kills: 3, .. })
    ));
    assert!(shared.lock().unwrap().processes.is_empty());
}

#[test]
fn test_critical_growth_bypasses_confirmations_and_mode() {
    let settings = Settings {
        mode: Mode::Protection,
        confirmations: 10,
        ..base_settings()
    };
    let world = World {
        usage_pct: 80.0,
        total_bytes: GIB,
        processes: vec![proc(7, "runaway", 0.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);

    for i in 0..5u64 {
        set_memory(&shared, 7, 100 + 50 * i);
        assert!(cycle(&mut engine, &clock).kills.is_empty());
    }
    // First full window: 600 MB/min against ~205 MB of headroom
    set_memory(&shared, 7, 100 + 50 * 5);
    let report = cycle(&mut engine, &clock);
    assert_eq!(report.kills.len(), 1);
    assert_eq!(report.kills[0].reason, KillReason::CriticalLeak);
}

#[test]
fn test_protection_mode_spares_confirmed_leak_below_threshold() {
    let settings = Settings {
        mode: Mode::Protection,
        leak_threshold_pct: 85.0,
        ..base_settings()
    };
    let world = World {
        processes: vec![proc(100, "leaky", 0.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);
    let key = EntityKey::process(100, 0.0);

    let mut last = CycleReport::default();
    for i in 0..7u64 {
        set_memory(&shared, 100, 100 + 12 * i);
        last = cycle(&mut engine, &clock);
    }
    assert!(last.kills.is_empty());
    assert_eq!(last.spared, vec![key.clone()]);
    assert!(engine.registry().contains(&key));

    let w = shared.lock().unwrap();
    assert!(w.terminated.is_empty());
    assert!(w
        .events
        .iter()
        .any(|e| e.starts_with("Leak detected but not killed (protection mode")));
}

#[test]
fn test_plateau_after_suspicion_starts_cooldown() {
    let settings = Settings {
        mode: Mode::Hunting,
        confirmations: 3,
        ..base_settings()
    };
    let world = World {
        processes: vec![proc(100, "bursty", 0.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);
    let key = EntityKey::process(100, 0.0);

    for i in 0..6u64 {
        set_memory(&shared, 100, 100 + 12 * i);
        cycle(&mut engine, &clock);
    }
    assert_eq!(engine.registry().get(&key).map(|t| t.suspect_runs), Some(1));

    // Flat sample: the window's net growth drops to 48 MB
    set_memory(&shared, 100, 160);
    cycle(&mut engine, &clock);
    let trk = engine.registry().get(&key).expect("tracker kept");
    assert_eq!(trk.suspect_runs, 0);
    assert!(trk.in_cooldown(clock.now()));

    for i in 1..=10u64 {
        set_memory(&shared, 100, 160 + 12 * i);
        let report = cycle(&mut engine, &clock);
        assert!(report.kills.is_empty(), "killed during cooldown");
    }
    assert_eq!(engine.registry().get(&key).map(|t| t.suspect_runs), Some(0));
}

#[test]
fn test_repeat_offender_triggers_one_notification() {
    let world = World {
        drop_per_kill: 20.0,
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(base_settings(), world);

    for round in 0..4u32 {
        {
            let mut w = shared.lock().unwrap();
            w.usage_pct = 95.0;
            w.processes = vec![proc(500 + round, "chrome", 0.0, 800)];
        }
        let report = cycle(&mut engine, &clock);
        assert_eq!(report.kills.len(), 1, "round {}", round);
        assert_eq!(report.escalations.len(), usize::from(round == 2));
    }

    let w = shared.lock().unwrap();
    assert_eq!(w.notifications.len(), 1);
    assert_eq!(w.notifications[0].0, "Memory Leak Killer");
    assert!(w.notifications[0].1.contains("chrome (parent: bash) was killed 3x in the last 10 minutes"));
}

#[test]
fn test_recycled_pid_gets_fresh_tracker() {
    let world = World {
        processes: vec![proc(200, "worker", 1_000.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(base_settings(), world);
    let old_key = EntityKey::process(200, 1_000.0);
    let new_key = EntityKey::process(200, 2_000.0);

    for _ in 0..4 {
        cycle(&mut engine, &clock);
    }
    assert_eq!(engine.registry().get(&old_key).map(|t| t.history.len()), Some(4));

    shared.lock().unwrap().processes = vec![proc(200, "worker", 2_000.0, 100)];
    let report = cycle(&mut engine, &clock);
    assert_eq!(report.pruned, 1);
    assert!(!engine.registry().contains(&old_key));
    assert_eq!(engine.registry().get(&new_key).map(|t| t.history.len()), Some(1));
}

#[test]
fn test_unavailable_container_source_is_disabled_for_the_run() {
    let settings = Settings {
        containers: true,
        ..base_settings()
    };
    let world = World {
        containers: ContainerFeed::Unavailable,
        processes: vec![proc(1, "app", 0.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);

    cycle(&mut engine, &clock);
    assert!(!engine.containers_enabled());
    cycle(&mut engine, &clock);

    let w = shared.lock().unwrap();
    assert_eq!(w.container_polls, 1);
    assert!(w.events.iter().any(|e| e.starts_with("Container monitoring disabled")));
}

#[test]
fn test_transient_container_failure_keeps_trackers() {
    let settings = Settings {
        containers: true,
        ..base_settings()
    };
    let world = World {
        containers: ContainerFeed::List(vec![ContainerSnapshot {
            id: "abc123def456".into(),
            name: "api".into(),
            memory_bytes: 200 * MB,
        }]),
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);
    let key = EntityKey::Container("abc123def456".into());

    cycle(&mut engine, &clock);
    assert!(engine.registry().contains(&key));

    shared.lock().unwrap().containers = ContainerFeed::Failed;
    let report = cycle(&mut engine, &clock);
    assert_eq!(report.pruned, 0);
    assert!(engine.registry().contains(&key));
    assert!(engine.containers_enabled());

    shared.lock().unwrap().containers = ContainerFeed::List(Vec::new());
    let report = cycle(&mut engine, &clock);
    assert_eq!(report.pruned, 1);
    assert!(!engine.registry().contains(&key));
}

#[test]
fn test_vanished_target_is_dropped_and_relief_continues() {
    let mut ghost = proc(10, "ghost", 0.0, 100);
    ghost.child_count = 5;
    let mut world = World {
        usage_pct: 95.0,
        drop_per_kill: 20.0,
        processes: vec![ghost, proc(11, "worker", 0.0, 100)],
        ..World::default()
    };
    world.vanish.insert("ghost".into());
    let (mut engine, _shared, clock) = harness(base_settings(), world);

    let report = cycle(&mut engine, &clock);
    let names: Vec<&str> = report.kills.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["worker"]);
    assert!(report.failed.is_empty());
    assert!(!engine.registry().contains(&EntityKey::process(10, 0.0)));
}

#[test]
fn test_denied_termination_keeps_tracker() {
    let settings = Settings {
        mode: Mode::Hunting,
        ..base_settings()
    };
    let mut world = World {
        processes: vec![proc(100, "rootd", 0.0, 100)],
        ..World::default()
    };
    world.deny.insert("rootd".into());
    let (mut engine, shared, clock) = harness(settings, world);
    let key = EntityKey::process(100, 0.0);

    let mut last = CycleReport::default();
    for i in 0..8u64 {
        set_memory(&shared, 100, 100 + 12 * i);
        last = cycle(&mut engine, &clock);
    }
    assert!(last.kills.is_empty());
    assert_eq!(last.failed, vec![key.clone()]);
    assert!(engine.registry().contains(&key));

    let w = shared.lock().unwrap();
    assert_eq!(w.events.iter().filter(|e| e.starts_with("Failed to kill")).count(), 2);
}

#[test]
fn test_param_adjustment_is_rate_limited() {
    let (mut engine, shared, clock) = harness(base_settings(), World::default());

    assert!(cycle(&mut engine, &clock).params_adjusted);
    assert_eq!(engine.params().current_confirmations, 2);

    shared.lock().unwrap().usage_pct = 92.0;
    let report = cycle(&mut engine, &clock);
    assert!(!report.params_adjusted);
    assert_eq!(engine.params().pressure_factor, 1.0);

    clock.set(T0 + 30.0);
    assert!(cycle(&mut engine, &clock).params_adjusted);
    assert_eq!(engine.params().pressure_factor, 0.5);
    assert_eq!(engine.params().current_confirmations, 1);
}

#[test]
fn test_whitelist_and_scope_limit_relief() {
    let settings = Settings {
        scope_restricted: true,
        scope_ancestors: vec!["kitty".to_string()],
        ..base_settings()
    };
    let mut in_scope = proc(2, "cargo", 0.0, 100);
    in_scope.ancestry = vec!["zsh".into(), "kitty".into(), "systemd".into()];
    let mut whitelisted = proc(1, "sshd", 0.0, 4000);
    whitelisted.ancestry = vec!["kitty".into()];
    let world = World {
        usage_pct: 99.0,
        processes: vec![whitelisted, proc(3, "postgres", 0.0, 4000), in_scope],
        ..World::default()
    };
    let (mut engine, shared, clock) = harness(settings, world);

    let report = cycle(&mut engine, &clock);
    let names: Vec<&str> = report.kills.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["cargo"]);
    assert_eq!(shared.lock().unwrap().processes.len(), 2);
}

#[test]
fn test_young_process_is_untracked_but_relievable() {
    let world = World {
        usage_pct: 95.0,
        drop_per_kill: 20.0,
        processes: vec![proc(42, "build", T0 - 10.0, 300)],
        ..World::default()
    };
    let (mut engine, _shared, clock) = harness(base_settings(), world);

    let report = cycle(&mut engine, &clock);
    assert_eq!(report.kills.len(), 1);
    assert_eq!(report.kills[0].name, "build");
    assert!(engine.registry().is_empty());
}

#[test]
fn test_unreadable_usage_fails_cycle_without_side_effects() {
    let world = World {
        fail_usage: true,
        processes: vec![proc(1, "app", 0.0, 100)],
        ..World::default()
    };
    let (mut engine, shared, _clock) = harness(base_settings(), world);

    assert!(matches!(engine.run_cycle(), Err(TelemetryError::Failed(_))));
    assert!(engine.registry().is_empty());
    assert!(shared.lock().unwrap().terminated.is_empty());
}
