//! Suspicion scoring for pressure relief.
//!
//! Each visible entity gets a score from five weighted terms; relief kills
//! in descending score order until usage drops below the low-water mark.

use std::cmp::Ordering;

use crate::regression::bytes_per_sec_to_mb_per_min;
use crate::settings::{ScoreWeights, MB};
use crate::telemetry::Target;
use crate::tracker::Tracker;

/// One relief candidate with its computed score.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub target: Target,
    pub score: f64,
    /// Regression slope used for scoring, MB/min
    pub slope_mb_per_min: f64,
}

/// Per-term breakdown, mainly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreTerms {
    pub suspect: f64,
    pub slope: f64,
    pub youth: f64,
    pub child: f64,
    pub rss: f64,
}

impl ScoreTerms {
    pub fn total(&self) -> f64 {
        self.suspect + self.slope + self.youth + self.child + self.rss
    }
}

/// Youth in `[0, 1]`: 1 for a brand-new entity, 0 once older than `recent_secs`.
pub fn youth(age_secs: f64, recent_secs: f64) -> f64 {
    if recent_secs <= 0.0 {
        return 0.0;
    }
    ((recent_secs - age_secs) / recent_secs).clamp(0.0, 1.0)
}

fn window_slope_mb_per_min(tracker: Option<&Tracker>) -> f64 {
    tracker
        .filter(|t| t.is_full())
        .map(|t| bytes_per_sec_to_mb_per_min(t.growth_rate))
        .unwrap_or(0.0)
}

/// Computes the weighted terms for one target.
///
/// Slope only counts once the tracker's window is full. Containers carry no
/// age and no children, so their youth and child terms are zero.
pub fn score_terms(
    target: &Target,
    tracker: Option<&Tracker>,
    weights: &ScoreWeights,
    recent_secs: f64,
    now: f64,
) -> ScoreTerms {
    let suspect_runs = tracker.map(|t| t.suspect_runs).unwrap_or(0) as f64;
    let slope_mb_min = window_slope_mb_per_min(tracker);
    let rss_mb = target.memory_bytes() as f64 / MB;

    let (youth_term, child_term) = match target {
        Target::Process(p) => (
            youth(now - p.start_time, recent_secs) * weights.youth,
            p.child_count as f64 * weights.child,
        ),
        Target::Container(_) => (0.0, 0.0),
    };

    ScoreTerms {
        suspect: suspect_runs * weights.suspect,
        slope: slope_mb_min * weights.slope,
        youth: youth_term,
        child: child_term,
        rss: rss_mb * weights.rss,
    }
}

pub fn build_candidate(
    target: Target,
    tracker: Option<&Tracker>,
    weights: &ScoreWeights,
    recent_secs: f64,
    now: f64,
) -> Candidate {
    let terms = score_terms(&target, tracker, weights, recent_secs, now);
    Candidate {
        target,
        score: terms.total(),
        slope_mb_per_min: window_slope_mb_per_min(tracker),
    }
}

/// Sorts candidates by descending score. Equal scores keep discovery order.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates
}
