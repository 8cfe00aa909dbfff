//! Performance metrics — pure functions that compute backtest statistics.
//!
//! Every metric is a pure function: trade list and/or P&L series in, scalar out.
//! No dependencies on the optimizer, data loading, or export.

use serde::{Deserialize, Serialize};
use goldlab_core::domain::{ExitReason, TradeRecord};
use goldlab_core::engine::EngineRun;

/// Summary statistics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub threshold: f64,
    pub trade_count: usize,
    /// WIN-class trades (target, break-even, timeout win).
    pub wins: usize,
    /// LOSS-class trades (stop, timeout loss).
    pub losses: usize,
    pub timeouts: usize,
    pub break_even_exits: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_win: f64,
    /// Mean loss magnitude (positive).
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Total return as a percentage of initial capital.
    pub total_return_pct: f64,
    /// Currency drawdown from the running peak (≤ 0).
    pub max_drawdown: f64,
    /// Drawdown as a percentage of initial capital (≤ 0).
    pub max_drawdown_pct: f64,
    pub avg_bars_held: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Win rate needed to break even at the configured reward:risk.
    pub breakeven_win_rate: f64,
    /// `win_rate − breakeven_win_rate`.
    pub edge: f64,
    pub qualifying_signals: usize,
    pub skipped_invalid: usize,
}

impl BacktestSummary {
    /// Compute all statistics from an aggregator run.
    pub fn compute(run: &EngineRun, reward_risk: f64) -> Self {
        let trades = &run.trades;
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let wr = win_rate(trades);
        let (avg_w, avg_l) = (avg_win(trades), avg_loss(trades));
        let be_wr = breakeven_win_rate(reward_risk);
        Self {
            threshold: run.threshold,
            trade_count: trades.len(),
            wins: trades.iter().filter(|t| t.is_winner()).count(),
            losses: trades.iter().filter(|t| !t.is_winner()).count(),
            timeouts: trades.iter().filter(|t| t.outcome.is_timeout()).count(),
            break_even_exits: trades
                .iter()
                .filter(|t| t.exit_reason == ExitReason::BreakEven)
                .count(),
            win_rate: wr,
            total_pnl: pnls.iter().sum(),
            avg_win: avg_w,
            avg_loss: avg_l,
            profit_factor: profit_factor(&pnls),
            expectancy: expectancy(wr, avg_w, avg_l),
            sharpe: sharpe_ratio(&pnls),
            initial_capital: run.initial_capital,
            final_capital: run.final_capital,
            total_return_pct: total_return_pct(run.initial_capital, run.final_capital),
            max_drawdown: run.max_drawdown,
            max_drawdown_pct: run.max_drawdown_pct,
            avg_bars_held: avg_bars_held(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            breakeven_win_rate: be_wr,
            edge: if trades.is_empty() { 0.0 } else { wr - be_wr },
            qualifying_signals: run.counts.qualifying,
            skipped_invalid: run.counts.skipped_invalid,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Win rate: fraction of trades in the WIN class.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Mean P&L of WIN-class trades; 0 when there are none.
pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    mean_f64(
        &trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.pnl)
            .collect::<Vec<_>>(),
    )
}

/// Mean loss magnitude of LOSS-class trades; 0 when there are none.
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    mean_f64(
        &trades
            .iter()
            .filter(|t| !t.is_winner())
            .map(|t| t.pnl)
            .collect::<Vec<_>>(),
    )
    .abs()
}

/// Profit factor: gross profit / gross loss.
///
/// Defined as 0.0 when there are no losing trades.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-10 {
        return 0.0;
    }
    gross_profit / gross_loss
}

/// Expected P&L per trade: `win_rate × avg_win − (1 − win_rate) × avg_loss`.
pub fn expectancy(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    win_rate * avg_win - (1.0 - win_rate) * avg_loss
}

/// Per-trade Sharpe-like ratio: mean / population std-dev of P&L.
///
/// Returns 0.0 for fewer than 2 trades or zero variance.
pub fn sharpe_ratio(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let std = std_dev(pnls);
    if std < 1e-12 {
        return 0.0;
    }
    mean_f64(pnls) / std
}

/// Win rate that breaks even at a given reward:risk: `1 / (1 + rr)`.
pub fn breakeven_win_rate(reward_risk: f64) -> f64 {
    1.0 / (1.0 + reward_risk)
}

pub fn total_return_pct(initial: f64, final_capital: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_capital - initial) / initial * 100.0
}

pub fn avg_bars_held(trades: &[TradeRecord]) -> f64 {
    mean_f64(
        &trades
            .iter()
            .map(|t| t.bars_held as f64)
            .collect::<Vec<_>>(),
    )
}

/// Longest streak of consecutive winners (`winners = true`) or losers.
pub fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for t in trades {
        if t.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use goldlab_core::domain::{Direction, Outcome};

    fn trade(outcome: Outcome, exit_reason: ExitReason, pnl: f64, bars_held: usize) -> TradeRecord {
        let t = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TradeRecord {
            entry_bar: 0,
            entry_time: t,
            entry_price: 2000.0,
            direction: Direction::Long,
            probability: 0.7,
            score: 2,
            initial_stop: 1985.0,
            target: 2060.0,
            atr: 10.0,
            risk_distance: 15.0,
            break_even_activated: exit_reason == ExitReason::BreakEven,
            outcome,
            exit_reason,
            exit_bar: bars_held,
            exit_time: t,
            exit_price: 2000.0,
            bars_held,
            pnl_pct: 0.0,
            risk_amount: 100.0,
            pnl,
            capital_after: 0.0,
        }
    }

    fn mixed() -> Vec<TradeRecord> {
        vec![
            trade(Outcome::Win, ExitReason::Target, 400.0, 10),
            trade(Outcome::Loss, ExitReason::Stop, -100.0, 2),
            trade(Outcome::Loss, ExitReason::Stop, -100.0, 4),
            trade(Outcome::Win, ExitReason::BreakEven, 0.0, 6),
            trade(Outcome::TimeoutLoss, ExitReason::Timeout, -20.0, 180),
        ]
    }

    #[test]
    fn win_rate_counts_break_even_as_win() {
        assert!((win_rate(&mixed()) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn averages_use_subsets() {
        let trades = mixed();
        assert!((avg_win(&trades) - 200.0).abs() < 1e-12);
        assert!((avg_loss(&trades) - 220.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn averages_zero_on_empty_subsets() {
        let wins = vec![trade(Outcome::Win, ExitReason::Target, 400.0, 3)];
        assert_eq!(avg_loss(&wins), 0.0);
        assert_eq!(avg_win(&[]), 0.0);
    }

    #[test]
    fn profit_factor_zero_without_losses() {
        assert_eq!(profit_factor(&[400.0, 400.0]), 0.0);
        assert!((profit_factor(&[400.0, -100.0, -100.0]) - 2.0).abs() < 1e-12);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn expectancy_formula() {
        // 30% × 400 − 70% × 100 = 50
        assert!((expectancy(0.3, 400.0, 100.0) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn sharpe_uses_population_std() {
        // mean 150, population std 250
        assert!((sharpe_ratio(&[400.0, -100.0]) - 0.6).abs() < 1e-12);
        assert_eq!(sharpe_ratio(&[400.0]), 0.0);
        assert_eq!(sharpe_ratio(&[100.0, 100.0]), 0.0);
    }

    #[test]
    fn streaks() {
        let trades = mixed();
        assert_eq!(max_consecutive(&trades, true), 1);
        assert_eq!(max_consecutive(&trades, false), 2);
    }

    #[test]
    fn breakeven_rate_for_rr4() {
        assert!((breakeven_win_rate(4.0) - 0.2).abs() < 1e-12);
    }
}
