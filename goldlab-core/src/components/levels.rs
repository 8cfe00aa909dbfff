//! Stop-loss / take-profit level models.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction};

/// How stop and target distances are sized from the entry bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelModel {
    /// Distances as multiples of the entry bar's ATR.
    Atr {
        sl_multiplier: f64,
        tp_multiplier: f64,
    },
    /// Distances as a percentage of the entry price.
    Percent { sl_pct: f64, tp_pct: f64 },
}

/// Level model plus an optional reward:risk floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub model: LevelModel,
    /// When target distance / stop distance falls below this, the target is
    /// pushed out to `stop distance × min_reward_risk`.
    #[serde(default)]
    pub min_reward_risk: Option<f64>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            model: LevelModel::Atr {
                sl_multiplier: 1.5,
                tp_multiplier: 6.0,
            },
            min_reward_risk: None,
        }
    }
}

/// Concrete stop and target prices for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub stop: f64,
    pub target: f64,
}

impl LevelConfig {
    /// Compute stop and target for an entry. Degenerate ATR values are passed
    /// through; the resolver rejects the resulting degenerate or inverted
    /// levels. Callers check [`LevelConfig::can_size`] first.
    pub fn levels(&self, direction: Direction, entry: f64, atr: f64) -> Levels {
        let (sl_dist, mut tp_dist) = match self.model {
            LevelModel::Atr {
                sl_multiplier,
                tp_multiplier,
            } => (sl_multiplier * atr, tp_multiplier * atr),
            LevelModel::Percent { sl_pct, tp_pct } => {
                (entry * sl_pct / 100.0, entry * tp_pct / 100.0)
            }
        };

        if let Some(min_rr) = self.min_reward_risk {
            if sl_dist > 0.0 && tp_dist / sl_dist < min_rr {
                tp_dist = sl_dist * min_rr;
            }
        }

        let sign = direction.sign();
        Levels {
            stop: entry - sign * sl_dist,
            target: entry + sign * tp_dist,
        }
    }

    /// False when the model needs an ATR and the bar's is NaN or non-positive.
    pub fn can_size(&self, bar: &Bar) -> bool {
        match self.model {
            LevelModel::Atr { .. } => bar.has_usable_atr(),
            LevelModel::Percent { .. } => true,
        }
    }
}
