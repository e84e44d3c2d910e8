//! Repeat-offender detection.
//!
//! Every successful kill is recorded under `(name, parent_name)`. When the
//! same pair is killed `threshold` times inside the look-back window an
//! [`Escalation`] is produced and the pair's history is cleared, so the next
//! escalation needs a full new set of kills.

use ahash::AHashMap as HashMap;
use tracing::debug;

/// Key under which kills are counted: entity name plus parent name.
pub type OffenderKey = (String, String);

/// Signal that an offender crossed the notify threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub name: String,
    pub parent: String,
    pub count: usize,
}

#[derive(Debug)]
pub struct RecidivismTracker {
    kills: HashMap<OffenderKey, Vec<f64>>,
    threshold: usize,
    window_secs: f64,
}

impl RecidivismTracker {
    pub fn new(threshold: usize, window_secs: f64) -> Self {
        Self {
            kills: HashMap::new(),
            threshold: threshold.max(1),
            window_secs,
        }
    }

    /// Records one kill at `now` and returns an escalation if the threshold
    /// is reached within the window.
    pub fn record(&mut self, key: OffenderKey, now: f64) -> Option<Escalation> {
        let cutoff = now - self.window_secs;
        let entries = self.kills.entry(key.clone()).or_default();
        entries.push(now);
        entries.retain(|&t| t >= cutoff);

        let count = entries.len();
        debug!("Recidivism {}/{}: {} kill(s) in window", key.0, key.1, count);

        if count >= self.threshold {
            self.kills.remove(&key);
            let (name, parent) = key;
            return Some(Escalation { name, parent, count });
        }
        None
    }

    /// Kills currently counted for `key` within the window ending at `now`.
    pub fn count(&mut self, key: &OffenderKey, now: f64) -> usize {
        let cutoff = now - self.window_secs;
        match self.kills.get_mut(key) {
            Some(entries) => {
                entries.retain(|&t| t >= cutoff);
                entries.len()
            }
            None => 0,
        }
    }
}
