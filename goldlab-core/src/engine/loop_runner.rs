//! Backtest aggregator — chronological scan over qualifying signals.
//!
//! For each bar whose signal clears the probability threshold and implies a
//! direction, the loop builds an entry at that bar's close, resolves it with
//! [`resolve_trade`], books P&L against the running capital, and appends a
//! [`TradeRecord`]. Invalid trades are skipped and counted, never fatal.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::domain::{validate_bars, validate_signals, Bar, Signal, TradeRecord};

use super::accounting::{trade_pnl, CapitalTracker};
use super::config::{PositionLimit, TradingConfig};
use super::resolver::{resolve_trade, EntryEvent};
use super::EngineError;

/// Signal accounting for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCounts {
    pub bars: usize,
    /// Signals with probability ≥ threshold.
    pub qualifying: usize,
    /// Qualifying signals whose score implied no direction.
    pub no_direction: usize,
    /// Qualifying, directional signals rejected by the resolver.
    pub skipped_invalid: usize,
    /// Qualifying, directional signals blocked by an open position.
    pub skipped_position_limit: usize,
    pub traded: usize,
}

/// Output of one aggregator run at a single threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRun {
    pub threshold: f64,
    pub trades: Vec<TradeRecord>,
    /// Capital after each trade, in trade order.
    pub equity_curve: Vec<f64>,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub peak_capital: f64,
    /// Most negative `capital − running peak`, in currency (≤ 0).
    pub max_drawdown: f64,
    /// `max_drawdown` as a percentage of initial capital (≤ 0).
    pub max_drawdown_pct: f64,
    pub counts: SignalCounts,
    /// True when a cancel flag stopped the run early.
    pub interrupted: bool,
}

impl EngineRun {
    pub fn total_pnl(&self) -> f64 {
        self.final_capital - self.initial_capital
    }
}

/// Run the aggregator over `bars`/`signals` at `threshold`.
pub fn run_backtest(
    bars: &[Bar],
    signals: &[Signal],
    threshold: f64,
    config: &TradingConfig,
) -> Result<EngineRun, EngineError> {
    run_backtest_with_cancel(bars, signals, threshold, config, None)
}

/// Like [`run_backtest`], checking `cancel` before each candidate trade.
///
/// On cancellation the partial run is returned with `interrupted = true`.
pub fn run_backtest_with_cancel(
    bars: &[Bar],
    signals: &[Signal],
    threshold: f64,
    config: &TradingConfig,
    cancel: Option<&AtomicBool>,
) -> Result<EngineRun, EngineError> {
    if !threshold.is_finite() {
        return Err(EngineError::InvalidThreshold(threshold));
    }
    config.validate()?;
    validate_bars(bars)?;
    validate_signals(bars, signals)?;

    let policy = config.break_even_policy();
    let mut capital = CapitalTracker::new(config.initial_capital);
    let mut trades = Vec::new();
    let mut equity_curve = Vec::new();
    let mut counts = SignalCounts {
        bars: bars.len(),
        ..SignalCounts::default()
    };
    let mut next_free_bar = 0usize;
    let mut interrupted = false;

    for (i, (bar, signal)) in bars.iter().zip(signals).enumerate() {
        if !signal.qualifies(threshold) {
            continue;
        }
        counts.qualifying += 1;

        let Some(direction) = signal.direction(config.min_score_magnitude) else {
            counts.no_direction += 1;
            continue;
        };

        if config.position_limit == PositionLimit::Single && i < next_free_bar {
            counts.skipped_position_limit += 1;
            continue;
        }

        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            interrupted = true;
            break;
        }

        if !config.levels.can_size(bar) {
            debug!(bar = i, atr = bar.atr, "skipping entry without usable ATR");
            counts.skipped_invalid += 1;
            continue;
        }
        let levels = config.levels.levels(direction, bar.close, bar.atr);
        let entry = EntryEvent {
            bar_index: i,
            direction,
            entry_price: bar.close,
            stop_price: levels.stop,
            target_price: levels.target,
        };

        let resolution = match resolve_trade(bars, &entry, config.lookahead_horizon, policy) {
            Ok(r) => r,
            Err(e) => {
                debug!(bar = i, error = %e, "skipping invalid trade");
                counts.skipped_invalid += 1;
                continue;
            }
        };

        let risk = config.risk_for(capital.capital);
        let pnl = trade_pnl(
            config.pnl_mode,
            risk,
            config.target_reward_risk,
            &entry,
            &resolution,
        );
        let capital_after = capital.apply(pnl);
        equity_curve.push(capital_after);
        next_free_bar = resolution.exit_bar;

        trades.push(TradeRecord {
            entry_bar: i,
            entry_time: bar.timestamp,
            entry_price: entry.entry_price,
            direction,
            probability: signal.probability,
            score: signal.score,
            initial_stop: entry.stop_price,
            target: entry.target_price,
            atr: bar.atr,
            risk_distance: entry.risk_distance(),
            break_even_activated: resolution.break_even_activated,
            outcome: resolution.outcome,
            exit_reason: resolution.exit_reason,
            exit_bar: resolution.exit_bar,
            exit_time: bars[resolution.exit_bar].timestamp,
            exit_price: resolution.exit_price,
            bars_held: resolution.bars_held,
            pnl_pct: direction.pct_move(entry.entry_price, resolution.exit_price),
            risk_amount: risk,
            pnl,
            capital_after,
        });
        counts.traded += 1;
    }

    if interrupted {
        warn!(
            threshold,
            trades = trades.len(),
            "backtest interrupted; returning partial run"
        );
    }
    info!(
        threshold,
        trades = trades.len(),
        qualifying = counts.qualifying,
        skipped_invalid = counts.skipped_invalid,
        final_capital = capital.capital,
        "backtest complete"
    );

    Ok(EngineRun {
        threshold,
        trades,
        equity_curve,
        initial_capital: capital.initial,
        final_capital: capital.capital,
        peak_capital: capital.peak,
        max_drawdown: capital.max_drawdown,
        max_drawdown_pct: capital.max_drawdown_pct(),
        counts,
        interrupted,
    })
}
