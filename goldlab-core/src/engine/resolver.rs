//! Trade resolver — walks forward from an entry bar until stop, target, or horizon.
//!
//! Per forward bar the order of checks is fixed:
//!
//! 1. Break-even policy may relocate the stop to entry.
//! 2. Stop check (a relocated stop resolves as a WIN at entry).
//! 3. Target check.
//!
//! Stop precedes target, so a bar that spans both levels resolves as a LOSS.
//! Nothing after the resolving bar is examined.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::components::{BreakEvenPolicy, StopState};
use crate::domain::{Bar, Direction, ExitReason, Outcome};

/// A candidate trade at the close of `bar_index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryEvent {
    pub bar_index: usize,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

impl EntryEvent {
    /// Absolute distance from entry to the initial stop.
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_price).abs()
    }

    /// Stop and target distances signed by direction. Both are positive
    /// only when the stop sits on the adverse side and the target on the
    /// favorable side of entry.
    pub fn signed_distances(&self) -> (f64, f64) {
        let sign = self.direction.sign();
        (
            sign * (self.entry_price - self.stop_price),
            sign * (self.target_price - self.entry_price),
        )
    }
}

/// How a trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: Outcome,
    pub exit_reason: ExitReason,
    pub exit_bar: usize,
    pub exit_price: f64,
    pub bars_held: usize,
    pub break_even_activated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidTradeReason {
    /// Stop distance is zero, negative, or NaN.
    DegenerateRisk { risk_distance: f64 },
    /// Stop or target lies on the wrong side of entry for the direction.
    LevelsMisplaced { stop: f64, target: f64 },
    /// The entry bar is the last bar, or the horizon is zero.
    NoForwardBars,
}

impl fmt::Display for InvalidTradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateRisk { risk_distance } => {
                write!(f, "degenerate risk distance {risk_distance}")
            }
            Self::LevelsMisplaced { stop, target } => {
                write!(f, "stop {stop} / target {target} on the wrong side of entry")
            }
            Self::NoForwardBars => write!(f, "no forward bars to resolve against"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid trade at bar {bar_index}: {reason}")]
pub struct InvalidTradeError {
    pub bar_index: usize,
    pub reason: InvalidTradeReason,
}

/// Resolve one trade against `bars[entry.bar_index + 1 ..= entry.bar_index + horizon]`
/// (clipped to the end of the series).
///
/// Unresolved trades at the horizon exit at the last examined close: a strictly
/// favorable move is `TimeoutWin`, anything else is `TimeoutLoss`.
pub fn resolve_trade(
    bars: &[Bar],
    entry: &EntryEvent,
    horizon: usize,
    break_even: &dyn BreakEvenPolicy,
) -> Result<Resolution, InvalidTradeError> {
    match walk_forward(bars, entry, horizon, break_even)? {
        Walk::Resolved(resolution) => Ok(resolution),
        Walk::Exhausted {
            last_bar,
            break_even_activated,
        } => {
            let exit_price = bars[last_bar].close;
            let outcome = if entry.direction.pct_move(entry.entry_price, exit_price) > 0.0 {
                Outcome::TimeoutWin
            } else {
                Outcome::TimeoutLoss
            };
            Ok(Resolution {
                outcome,
                exit_reason: ExitReason::Timeout,
                exit_bar: last_bar,
                exit_price,
                bars_held: last_bar - entry.bar_index,
                break_even_activated,
            })
        }
    }
}

/// Like [`resolve_trade`], but returns `None` instead of a timeout resolution.
pub fn resolve_within_horizon(
    bars: &[Bar],
    entry: &EntryEvent,
    horizon: usize,
    break_even: &dyn BreakEvenPolicy,
) -> Result<Option<Resolution>, InvalidTradeError> {
    Ok(match walk_forward(bars, entry, horizon, break_even)? {
        Walk::Resolved(resolution) => Some(resolution),
        Walk::Exhausted { .. } => None,
    })
}

enum Walk {
    Resolved(Resolution),
    Exhausted {
        last_bar: usize,
        break_even_activated: bool,
    },
}

fn walk_forward(
    bars: &[Bar],
    entry: &EntryEvent,
    horizon: usize,
    break_even: &dyn BreakEvenPolicy,
) -> Result<Walk, InvalidTradeError> {
    let risk = entry.risk_distance();
    if risk.is_nan() || risk <= 0.0 {
        return Err(InvalidTradeError {
            bar_index: entry.bar_index,
            reason: InvalidTradeReason::DegenerateRisk {
                risk_distance: risk,
            },
        });
    }
    let (stop_dist, target_dist) = entry.signed_distances();
    if stop_dist <= 0.0 || target_dist.is_nan() || target_dist <= 0.0 {
        return Err(InvalidTradeError {
            bar_index: entry.bar_index,
            reason: InvalidTradeReason::LevelsMisplaced {
                stop: entry.stop_price,
                target: entry.target_price,
            },
        });
    }

    let first = entry.bar_index + 1;
    if horizon == 0 || first >= bars.len() {
        return Err(InvalidTradeError {
            bar_index: entry.bar_index,
            reason: InvalidTradeReason::NoForwardBars,
        });
    }
    let last = entry.bar_index.saturating_add(horizon).min(bars.len() - 1);

    let direction = entry.direction;
    let p = entry.entry_price;
    let mut state = StopState::new(entry.stop_price);

    for (idx, bar) in bars.iter().enumerate().take(last + 1).skip(first) {
        state = break_even.maybe_activate(bar, direction, p, risk, state);

        let stop_hit = match direction {
            Direction::Long => bar.low <= state.current_stop,
            Direction::Short => bar.high >= state.current_stop,
        };
        if stop_hit {
            let at_entry = state.activated && state.current_stop == p;
            return Ok(Walk::Resolved(Resolution {
                outcome: if at_entry { Outcome::Win } else { Outcome::Loss },
                exit_reason: if at_entry {
                    ExitReason::BreakEven
                } else {
                    ExitReason::Stop
                },
                exit_bar: idx,
                exit_price: state.current_stop,
                bars_held: idx - entry.bar_index,
                break_even_activated: state.activated,
            }));
        }

        let target_hit = match direction {
            Direction::Long => bar.high >= entry.target_price,
            Direction::Short => bar.low <= entry.target_price,
        };
        if target_hit {
            return Ok(Walk::Resolved(Resolution {
                outcome: Outcome::Win,
                exit_reason: ExitReason::Target,
                exit_bar: idx,
                exit_price: entry.target_price,
                bars_held: idx - entry.bar_index,
                break_even_activated: state.activated,
            }));
        }
    }

    Ok(Walk::Exhausted {
        last_bar: last,
        break_even_activated: state.activated,
    })
}
