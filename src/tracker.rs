//! Per-entity trackers and the registry that owns them.
//!
//! The registry maps an [`EntityKey`] to a [`Tracker`] holding that entity's
//! sample history and leak state. Trackers are created on first observation
//! and removed when the entity disappears or is terminated.

use ahash::AHashMap as HashMap;

use crate::history::{HistoryBuffer, Sample};
use crate::telemetry::EntityKey;

/// Leak-detection state of a single process or container.
#[derive(Debug, Clone)]
pub struct Tracker {
    pub history: HistoryBuffer,
    /// Consecutive full windows that passed the leak test
    pub suspect_runs: u32,
    /// Evaluation is skipped while `now < exempt_until`
    pub exempt_until: f64,
    /// Last regression slope in bytes/sec
    pub growth_rate: f64,
}

impl Tracker {
    pub fn new(history_len: usize) -> Self {
        Self {
            history: HistoryBuffer::new(history_len),
            suspect_runs: 0,
            exempt_until: 0.0,
            growth_rate: 0.0,
        }
    }

    pub fn add(&mut self, timestamp: f64, memory_bytes: u64) {
        self.history.push(Sample::new(timestamp, memory_bytes));
    }

    pub fn is_full(&self) -> bool {
        self.history.is_full()
    }

    pub fn in_cooldown(&self, now: f64) -> bool {
        now < self.exempt_until
    }

    pub fn reset(&mut self) {
        self.suspect_runs = 0;
    }
}

/// Owner of all trackers, keyed by entity identity.
#[derive(Debug, Default)]
pub struct TrackerRegistry {
    trackers: HashMap<EntityKey, Tracker>,
    history_len: usize,
}

impl TrackerRegistry {
    /// Creates an empty registry whose trackers keep `history_len` samples.
    pub fn new(history_len: usize) -> Self {
        Self {
            trackers: HashMap::new(),
            history_len,
        }
    }

    /// Records a sample for an entity, creating its tracker on first sight.
    pub fn record(&mut self, key: &EntityKey, timestamp: f64, memory_bytes: u64) -> &mut Tracker {
        let history_len = self.history_len;
        let tracker = self
            .trackers
            .entry(key.clone())
            .or_insert_with(|| Tracker::new(history_len));
        tracker.add(timestamp, memory_bytes);
        tracker
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Tracker> {
        self.trackers.get(key)
    }

    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut Tracker> {
        self.trackers.get_mut(key)
    }

    pub fn remove(&mut self, key: &EntityKey) -> Option<Tracker> {
        self.trackers.remove(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.trackers.contains_key(key)
    }

    /// Drops every tracker for which `keep` returns false. Returns how many went.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&EntityKey) -> bool,
    {
        let before = self.trackers.len();
        self.trackers.retain(|k, _| keep(k));
        before - self.trackers.len()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creates_and_appends() {
        let mut registry = TrackerRegistry::new(3);
        let key = EntityKey::process(10, 500.0);

        registry.record(&key, 1.0, 100);
        registry.record(&key, 2.0, 200);

        let trk = registry.get(&key).expect("tracker created");
        assert_eq!(trk.history.len(), 2);
        assert_eq!(trk.history.capacity(), 3);
        assert!(!trk.is_full());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_multiple_entities() {
        let mut registry = TrackerRegistry::new(4);
        for pid in 0..3 {
            registry.record(&EntityKey::process(pid, 0.0), 1.0, 1);
        }
        registry.record(&EntityKey::Container("c1".into()), 1.0, 1);

        assert_eq!(registry.len(), 4);
        assert!(registry.contains(&EntityKey::Container("c1".into())));
    }

    #[test]
    fn test_retain_drops_missing() {
        let mut registry = TrackerRegistry::new(2);
        let keep = EntityKey::process(1, 0.0);
        let drop = EntityKey::process(2, 0.0);
        registry.record(&keep, 1.0, 1);
        registry.record(&drop, 1.0, 1);

        let removed = registry.retain(|k| k == &keep);
        assert_eq!(removed, 1);
        assert!(registry.contains(&keep));
        assert!(!registry.contains(&drop));
    }

    #[test]
    fn test_nonexistent_entity() {
        let mut registry = TrackerRegistry::new(2);
        assert!(registry.get(&EntityKey::process(99, 0.0)).is_none());
        assert!(registry.remove(&EntityKey::process(99, 0.0)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cooldown_window() {
        let mut trk = Tracker::new(2);
        trk.exempt_until = 100.0;
        assert!(trk.in_cooldown(99.9));
        assert!(!trk.in_cooldown(100.0));
    }
}
