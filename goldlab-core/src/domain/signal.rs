//! Signal — the classifier's per-bar prediction.

use serde::{Deserialize, Serialize};

use super::direction::Direction;

/// Per-bar prediction aligned 1:1 with the bar series (signal `i` belongs to bar `i`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Predicted probability of WIN, in [0, 1].
    pub probability: f64,
    /// Signed directional score; |score| >= 2 implies a tradeable direction.
    pub score: i32,
    /// Known outcome label from the data set (`target` column), when present.
    #[serde(default)]
    pub label: Option<bool>,
}

impl Signal {
    pub fn new(probability: f64, score: i32) -> Self {
        Self {
            probability,
            score,
            label: None,
        }
    }

    pub fn with_label(mut self, label: bool) -> Self {
        self.label = Some(label);
        self
    }

    /// True if the probability clears `threshold`. NaN never qualifies.
    pub fn qualifies(&self, threshold: f64) -> bool {
        self.probability >= threshold
    }

    pub fn direction(&self, min_magnitude: i32) -> Option<Direction> {
        Direction::from_score(self.score, min_magnitude)
    }
}

/// Number of signals whose probability clears `threshold`.
pub fn count_qualifying(signals: &[Signal], threshold: f64) -> usize {
    signals.iter().filter(|s| s.qualifies(threshold)).count()
}
