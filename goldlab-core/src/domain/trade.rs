//! TradeRecord — one simulated position from entry to resolution.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::direction::Direction;

/// Final classification of a resolved trade. Exactly one is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    /// Horizon exhausted, last close moved in the trade's favor.
    TimeoutWin,
    /// Horizon exhausted, last close flat or against the trade.
    TimeoutLoss,
}

impl Outcome {
    pub fn is_win(self) -> bool {
        matches!(self, Self::Win | Self::TimeoutWin)
    }

    /// True for synthetic resolutions at the lookahead horizon.
    pub fn is_timeout(self) -> bool {
        matches!(self, Self::TimeoutWin | Self::TimeoutLoss)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::TimeoutWin => "timeout_win",
            Self::TimeoutLoss => "timeout_loss",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which level closed the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Target,
    Stop,
    /// Stop hit after relocation to entry.
    BreakEven,
    Timeout,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Stop => "stop",
            Self::BreakEven => "break_even",
            Self::Timeout => "timeout",
        }
    }
}

/// A completed simulated trade with the context that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub direction: Direction,

    // ── Signal ──
    pub probability: f64,
    pub score: i32,

    // ── Levels ──
    pub initial_stop: f64,
    pub target: f64,
    pub atr: f64,
    pub risk_distance: f64,
    pub break_even_activated: bool,

    // ── Resolution ──
    pub outcome: Outcome,
    pub exit_reason: ExitReason,
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub bars_held: usize,

    // ── PnL ──
    pub pnl_pct: f64,
    pub risk_amount: f64,
    pub pnl: f64,
    pub capital_after: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.outcome.is_win()
    }

    /// Realised P&L in units of the risk taken (R multiple).
    pub fn r_multiple(&self) -> f64 {
        if self.risk_amount <= 0.0 {
            return 0.0;
        }
        self.pnl / self.risk_amount
    }
}
