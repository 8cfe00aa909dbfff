//! Trade direction derived from the directional score.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score magnitude the scripts require before a bar implies a direction.
pub const DEFAULT_MIN_SCORE_MAGNITUDE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Map a signed score to a direction. Scores strictly inside
    /// `(-min_magnitude, min_magnitude)` mean "no clear signal".
    pub fn from_score(score: i32, min_magnitude: i32) -> Option<Self> {
        if score >= min_magnitude {
            Some(Self::Long)
        } else if score <= -min_magnitude {
            Some(Self::Short)
        } else {
            None
        }
    }

    /// +1.0 for longs, -1.0 for shorts.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    /// Signed integer form (+1 / -1) used in exported tables.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }

    /// Direction-adjusted percentage move from `entry` to `exit`.
    pub fn pct_move(self, entry: f64, exit: f64) -> f64 {
        self.sign() * (exit - entry) / entry * 100.0
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_thresholds() {
        assert_eq!(Direction::from_score(2, 2), Some(Direction::Long));
        assert_eq!(Direction::from_score(3, 2), Some(Direction::Long));
        assert_eq!(Direction::from_score(-2, 2), Some(Direction::Short));
        assert_eq!(Direction::from_score(1, 2), None);
        assert_eq!(Direction::from_score(-1, 2), None);
        assert_eq!(Direction::from_score(0, 2), None);
    }

    #[test]
    fn pct_move_is_direction_adjusted() {
        assert!((Direction::Long.pct_move(2000.0, 2020.0) - 1.0).abs() < 1e-12);
        assert!((Direction::Short.pct_move(2000.0, 2020.0) + 1.0).abs() < 1e-12);
    }
}
