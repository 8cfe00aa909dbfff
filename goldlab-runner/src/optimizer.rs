//! Threshold optimizer — sweep a probability grid and select by objective.
//!
//! Each grid point is independent and reads the same immutable bars and
//! signals, so the sweep runs on rayon when `parallel` is set. Row order is
//! always grid order.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{info, warn};

use goldlab_core::domain::{validate_bars, validate_signals, Bar, Signal};
use goldlab_core::engine::{self, TradingConfig};

use crate::labeling::{label_outcomes, OutcomeLabel};
use crate::metrics::{self, BacktestSummary};
use crate::runner::{run_backtest, BacktestRun, RunError};

/// Errors from the optimizer.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("invalid threshold grid: {0}")]
    InvalidGrid(String),

    #[error("invalid objective: {0}")]
    InvalidObjective(String),

    #[error(
        "insufficient data: no threshold in {} reached {min_trades} trades \
         (best: {best_trade_count}) over {}",
        format_bounds(.thresholds), format_range(.data_range)
    )]
    InsufficientData {
        thresholds: (f64, f64),
        min_trades: usize,
        best_trade_count: usize,
        data_range: Option<(NaiveDateTime, NaiveDateTime)>,
    },

    #[error("sweep interrupted before any threshold was evaluated")]
    Interrupted,
}

fn format_bounds(bounds: &(f64, f64)) -> String {
    format!("[{:.2}, {:.2}]", bounds.0, bounds.1)
}

fn format_range(range: &Option<(NaiveDateTime, NaiveDateTime)>) -> String {
    match range {
        Some((start, end)) => format!("{start} to {end}"),
        None => "an unknown date range".into(),
    }
}

// ─── Grid ────────────────────────────────────────────────────────────

/// Ordered candidate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdGrid {
    values: Vec<f64>,
}

impl ThresholdGrid {
    /// `start, start + step, …` strictly below `end`, generated by index and
    /// rounded to 1e-9 so that 0.50 + 10 × 0.01 is exactly 0.60.
    pub fn range(start: f64, end: f64, step: f64) -> Result<Self, OptimizeError> {
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(OptimizeError::InvalidGrid("bounds must be finite".into()));
        }
        if step <= 0.0 {
            return Err(OptimizeError::InvalidGrid(format!(
                "step must be positive, got {step}"
            )));
        }
        if end <= start {
            return Err(OptimizeError::InvalidGrid(format!(
                "end {end} must exceed start {start}"
            )));
        }
        let n = ((end - start) / step - 1e-9).ceil() as usize;
        let values = (0..n)
            .map(|i| ((start + i as f64 * step) * 1e9).round() / 1e9)
            .collect();
        Self::explicit(values)
    }

    /// An explicit, strictly increasing list of thresholds in [0, 1].
    pub fn explicit(values: Vec<f64>) -> Result<Self, OptimizeError> {
        if values.is_empty() {
            return Err(OptimizeError::InvalidGrid("no thresholds".into()));
        }
        if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(OptimizeError::InvalidGrid(
                "thresholds must lie in [0, 1]".into(),
            ));
        }
        if values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(OptimizeError::InvalidGrid(
                "thresholds must be strictly increasing".into(),
            ));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn bounds(&self) -> (f64, f64) {
        (
            self.values.first().copied().unwrap_or_default(),
            self.values.last().copied().unwrap_or_default(),
        )
    }
}

// ─── Modes and objectives ───────────────────────────────────────────

/// How each grid point is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Run the full aggregator (capital path, drawdown) per threshold.
    #[default]
    FullBacktest,
    /// Resolve outcome labels once, then count per threshold.
    WinRateOnly,
}

/// Threshold selection objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Objective {
    /// Most trades among thresholds with win rate ≥ `target`; falls back to
    /// the highest win rate (reported as degraded) when none qualifies.
    TargetWinRate { target: f64, min_trades: usize },
    MaxWinRate { min_trades: usize },
    MaxSharpe { min_trades: usize },
}

impl Default for Objective {
    fn default() -> Self {
        Self::TargetWinRate {
            target: 0.70,
            min_trades: 100,
        }
    }
}

impl Objective {
    pub fn min_trades(&self) -> usize {
        match *self {
            Self::TargetWinRate { min_trades, .. }
            | Self::MaxWinRate { min_trades }
            | Self::MaxSharpe { min_trades } => min_trades,
        }
    }

    pub fn validate(&self) -> Result<(), OptimizeError> {
        if let Self::TargetWinRate { target, .. } = *self {
            if !(0.0..=1.0).contains(&target) {
                return Err(OptimizeError::InvalidObjective(format!(
                    "target win rate {target} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

// ─── Rows ────────────────────────────────────────────────────────────

/// Statistics at one candidate threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub threshold: f64,
    pub qualifying_signals: usize,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

impl SweepRow {
    fn from_summary(s: &BacktestSummary) -> Self {
        Self {
            threshold: s.threshold,
            qualifying_signals: s.qualifying_signals,
            trade_count: s.trade_count,
            wins: s.wins,
            losses: s.losses,
            win_rate: s.win_rate,
            total_pnl: s.total_pnl,
            avg_win: s.avg_win,
            avg_loss: s.avg_loss,
            profit_factor: s.profit_factor,
            expectancy: s.expectancy,
            sharpe: s.sharpe,
            max_drawdown: s.max_drawdown,
            max_drawdown_pct: s.max_drawdown_pct,
            precision: None,
            recall: None,
            f1: None,
        }
    }

    fn eligible(&self, min_trades: usize) -> bool {
        self.trade_count > 0 && self.trade_count >= min_trades
    }
}

/// Swept table in grid order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepTable {
    pub mode: SweepMode,
    pub rows: Vec<SweepRow>,
    /// True when a cancel flag cut the sweep short; missing rows were not evaluated.
    pub interrupted: bool,
}

// ─── Selection ───────────────────────────────────────────────────────

/// Which threshold was chosen, and whether the objective was met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Selection {
    Met {
        threshold: f64,
        row: SweepRow,
    },
    /// No threshold reached the target; the best available win rate is reported.
    Degraded {
        threshold: f64,
        target: f64,
        achieved: f64,
        row: SweepRow,
    },
}

impl Selection {
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Met { threshold, .. } | Self::Degraded { threshold, .. } => *threshold,
        }
    }

    pub fn row(&self) -> &SweepRow {
        match self {
            Self::Met { row, .. } | Self::Degraded { row, .. } => row,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

fn cmp_f64(a: f64, b: f64) -> CmpOrdering {
    a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal)
}

/// Select a threshold from a swept table.
///
/// Rows with zero trades or fewer than the objective's `min_trades` are never
/// selected. When no row is eligible the result is `InsufficientData`.
pub fn select_threshold(
    rows: &[SweepRow],
    objective: &Objective,
) -> Result<Selection, OptimizeError> {
    objective.validate()?;
    let min_trades = objective.min_trades();
    let eligible: Vec<&SweepRow> = rows.iter().filter(|r| r.eligible(min_trades)).collect();

    // Higher is better for every key; the final key prefers the lower threshold.
    let by_win_rate = |a: &&SweepRow, b: &&SweepRow| {
        cmp_f64(a.win_rate, b.win_rate)
            .then(a.trade_count.cmp(&b.trade_count))
            .then(cmp_f64(b.threshold, a.threshold))
    };

    let Some(best_win_rate) = eligible.iter().copied().max_by(|a, b| by_win_rate(a, b)) else {
        let thresholds = match (rows.first(), rows.last()) {
            (Some(f), Some(l)) => (f.threshold, l.threshold),
            _ => (0.0, 0.0),
        };
        return Err(OptimizeError::InsufficientData {
            thresholds,
            min_trades,
            best_trade_count: rows.iter().map(|r| r.trade_count).max().unwrap_or(0),
            data_range: None,
        });
    };

    let met = |row: &SweepRow| Selection::Met {
        threshold: row.threshold,
        row: row.clone(),
    };

    let selection = match *objective {
        Objective::TargetWinRate { target, .. } => {
            let most_trades = eligible
                .iter()
                .copied()
                .filter(|r| r.win_rate >= target)
                .max_by(|a, b| {
                    a.trade_count
                        .cmp(&b.trade_count)
                        .then(cmp_f64(a.win_rate, b.win_rate))
                        .then(cmp_f64(b.threshold, a.threshold))
                });
            match most_trades {
                Some(row) => met(row),
                None => {
                    warn!(
                        target,
                        achieved = best_win_rate.win_rate,
                        threshold = best_win_rate.threshold,
                        "no threshold reached the target win rate; using best available"
                    );
                    Selection::Degraded {
                        threshold: best_win_rate.threshold,
                        target,
                        achieved: best_win_rate.win_rate,
                        row: best_win_rate.clone(),
                    }
                }
            }
        }
        Objective::MaxWinRate { .. } => met(best_win_rate),
        Objective::MaxSharpe { .. } => {
            let best = eligible
                .iter()
                .copied()
                .max_by(|a, b| {
                    cmp_f64(a.sharpe, b.sharpe)
                        .then(a.trade_count.cmp(&b.trade_count))
                        .then(cmp_f64(b.threshold, a.threshold))
                })
                .unwrap_or(best_win_rate);
            met(best)
        }
    };
    Ok(selection)
}

// ─── Sweep executor ─────────────────────────────────────────────────

/// Selected threshold, the table it was chosen from, and a full run at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub selection: Selection,
    pub table: SweepTable,
    pub final_run: BacktestRun,
}

/// Threshold sweep executor.
pub struct ThresholdSweep {
    trading: TradingConfig,
    mode: SweepMode,
    parallel: bool,
}

impl ThresholdSweep {
    pub fn new(trading: TradingConfig) -> Self {
        Self {
            trading,
            mode: SweepMode::FullBacktest,
            parallel: true,
        }
    }

    pub fn with_mode(mut self, mode: SweepMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(
        &self,
        bars: &[Bar],
        signals: &[Signal],
        grid: &ThresholdGrid,
    ) -> Result<SweepTable, RunError> {
        self.sweep_with_progress(bars, signals, grid, None, |_, _, _| {})
    }

    /// Executes a sweep with progress reporting and optional cancellation.
    ///
    /// The callback is invoked after each row completes with the number of
    /// completed rows, the grid size, and the row. Under `parallel` rows
    /// complete out of order.
    pub fn sweep_with_progress<F>(
        &self,
        bars: &[Bar],
        signals: &[Signal],
        grid: &ThresholdGrid,
        cancel: Option<&AtomicBool>,
        progress: F,
    ) -> Result<SweepTable, RunError>
    where
        F: Fn(usize, usize, &SweepRow) + Send + Sync,
    {
        self.trading.validate()?;
        validate_bars(bars).map_err(engine::EngineError::from)?;
        validate_signals(bars, signals).map_err(engine::EngineError::from)?;

        let labels = match self.mode {
            SweepMode::WinRateOnly => Some(label_outcomes(bars, signals, &self.trading)?),
            SweepMode::FullBacktest => None,
        };

        let total = grid.values().len();
        let done = AtomicUsize::new(0);
        let evaluate = |&threshold: &f64| -> Option<Result<SweepRow, RunError>> {
            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return None;
            }
            let row = match &labels {
                Some(labels) => win_rate_row(signals, labels, threshold, &self.trading),
                None => match self.full_row(bars, signals, threshold, cancel) {
                    Ok(Some(row)) => row,
                    // cancelled mid-run: not a complete evaluation
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                },
            };
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress(n, total, &row);
            Some(Ok(row))
        };

        let rows: Vec<SweepRow> = if self.parallel {
            grid.values()
                .par_iter()
                .filter_map(evaluate)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            grid.values()
                .iter()
                .map_while(evaluate)
                .collect::<Result<Vec<_>, _>>()?
        };

        let interrupted = rows.len() < total;
        if interrupted {
            warn!(evaluated = rows.len(), total, "threshold sweep interrupted");
        }
        info!(rows = rows.len(), mode = ?self.mode, "threshold sweep complete");

        Ok(SweepTable {
            mode: self.mode,
            rows,
            interrupted,
        })
    }

    fn full_row(
        &self,
        bars: &[Bar],
        signals: &[Signal],
        threshold: f64,
        cancel: Option<&AtomicBool>,
    ) -> Result<Option<SweepRow>, RunError> {
        let run = engine::run_backtest_with_cancel(bars, signals, threshold, &self.trading, cancel)?;
        if run.interrupted {
            return Ok(None);
        }
        Ok(Some(SweepRow::from_summary(&BacktestSummary::compute(
            &run,
            self.trading.target_reward_risk,
        ))))
    }

    /// Sweep, select by `objective`, and re-run the full backtest at the choice.
    pub fn optimize(
        &self,
        bars: &[Bar],
        signals: &[Signal],
        grid: &ThresholdGrid,
        objective: &Objective,
        cancel: Option<&AtomicBool>,
    ) -> Result<ThresholdReport, RunError> {
        let table = self.sweep_with_progress(bars, signals, grid, cancel, |_, _, _| {})?;
        if table.rows.is_empty() {
            return Err(OptimizeError::Interrupted.into());
        }

        let selection = select_threshold(&table.rows, objective).map_err(|e| match e {
            OptimizeError::InsufficientData {
                min_trades,
                best_trade_count,
                ..
            } => OptimizeError::InsufficientData {
                thresholds: grid.bounds(),
                min_trades,
                best_trade_count,
                data_range: bars.first().zip(bars.last()).map(|(f, l)| (f.timestamp, l.timestamp)),
            },
            other => other,
        })?;
        info!(
            threshold = selection.threshold(),
            degraded = selection.is_degraded(),
            trades = selection.row().trade_count,
            win_rate = selection.row().win_rate,
            "threshold selected"
        );

        let final_run = run_backtest(bars, signals, selection.threshold(), &self.trading)?;
        Ok(ThresholdReport {
            selection,
            table,
            final_run,
        })
    }
}

/// Row from precomputed outcome labels: no capital path, fixed-R:R P&L.
///
/// A signal's own `label` takes precedence over the resolved outcome.
fn win_rate_row(
    signals: &[Signal],
    labels: &[OutcomeLabel],
    threshold: f64,
    trading: &TradingConfig,
) -> SweepRow {
    let outcome = |s: &Signal, l: OutcomeLabel| -> Option<bool> {
        s.label.or(match l {
            OutcomeLabel::Win => Some(true),
            OutcomeLabel::Loss => Some(false),
            _ => None,
        })
    };

    let mut qualifying = 0;
    let mut wins = 0;
    let mut losses = 0;
    let mut positives = 0;
    for (s, &l) in signals.iter().zip(labels) {
        let o = outcome(s, l);
        if o == Some(true) {
            positives += 1;
        }
        if !s.qualifies(threshold) {
            continue;
        }
        qualifying += 1;
        match o {
            Some(true) => wins += 1,
            Some(false) => losses += 1,
            None => {}
        }
    }

    let risk = trading.risk_for(trading.initial_capital);
    let reward = risk * trading.target_reward_risk;
    let pnls: Vec<f64> = std::iter::repeat(reward)
        .take(wins)
        .chain(std::iter::repeat(-risk).take(losses))
        .collect();
    let trades = wins + losses;
    let win_rate = if trades > 0 {
        wins as f64 / trades as f64
    } else {
        0.0
    };
    let avg_win = if wins > 0 { reward } else { 0.0 };
    let avg_loss = if losses > 0 { risk } else { 0.0 };

    let precision = (trades > 0).then_some(win_rate);
    let recall = (positives > 0).then(|| wins as f64 / positives as f64);
    let f1 = match (precision, recall) {
        (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
        (Some(_), Some(_)) => Some(0.0),
        _ => None,
    };

    SweepRow {
        threshold,
        qualifying_signals: qualifying,
        trade_count: trades,
        wins,
        losses,
        win_rate,
        total_pnl: pnls.iter().sum(),
        avg_win,
        avg_loss,
        profit_factor: metrics::profit_factor(&pnls),
        expectancy: metrics::expectancy(win_rate, avg_win, avg_loss),
        sharpe: metrics::sharpe_ratio(&pnls),
        max_drawdown: 0.0,
        max_drawdown_pct: 0.0,
        precision,
        recall,
        f1,
    }
}
