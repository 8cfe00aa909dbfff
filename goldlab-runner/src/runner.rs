//! Backtest runner — wires together the engine, fingerprints, and metrics.
//!
//! Entry points:
//! - `run_backtest()`: one threshold, full trade list and summary. Used by the CLI.
//! - `run_backtest_with_cancel()`: same, stoppable at trade granularity.
//! - `compare_with_baseline()`: chosen threshold vs. "take every directional signal".

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tracing::info;

use goldlab_core::domain::{Bar, Signal, TradeRecord};
use goldlab_core::engine::{self, EngineError, SignalCounts, TradingConfig};
use goldlab_core::fingerprint::{config_hash, dataset_hash};

use crate::config::ConfigError;
use crate::data_loader::LoadError;
use crate::metrics::BacktestSummary;
use crate::optimizer::OptimizeError;
use crate::walk_forward::WindowError;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("optimizer error: {0}")]
    Optimize(#[from] OptimizeError),
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    #[error("no bars between {from} and {to} (data covers {data_start} to {data_end})")]
    EmptyRange {
        from: NaiveDateTime,
        to: NaiveDateTime,
        data_start: NaiveDateTime,
        data_end: NaiveDateTime,
    },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub threshold: f64,
    pub summary: BacktestSummary,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<f64>,
    pub counts: SignalCounts,
    pub config: TradingConfig,
    pub config_hash: String,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub interrupted: bool,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestRun {
    fn from_engine(
        run: engine::EngineRun,
        config: &TradingConfig,
        bars: &[Bar],
        signals: &[Signal],
    ) -> Self {
        let summary = BacktestSummary::compute(&run, config.target_reward_risk);
        Self {
            schema_version: SCHEMA_VERSION,
            threshold: run.threshold,
            summary,
            trades: run.trades,
            equity_curve: run.equity_curve,
            counts: run.counts,
            config: config.clone(),
            config_hash: config_hash(config).0,
            dataset_hash: dataset_hash(bars, signals).0,
            bar_count: bars.len(),
            start: bars.first().map(|b| b.timestamp),
            end: bars.last().map(|b| b.timestamp),
            interrupted: run.interrupted,
        }
    }
}

/// Run one backtest at `threshold`.
pub fn run_backtest(
    bars: &[Bar],
    signals: &[Signal],
    threshold: f64,
    config: &TradingConfig,
) -> Result<BacktestRun, RunError> {
    run_backtest_with_cancel(bars, signals, threshold, config, None)
}

/// Run one backtest, checking `cancel` before each trade.
pub fn run_backtest_with_cancel(
    bars: &[Bar],
    signals: &[Signal],
    threshold: f64,
    config: &TradingConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestRun, RunError> {
    let run = engine::run_backtest_with_cancel(bars, signals, threshold, config, cancel)?;
    Ok(BacktestRun::from_engine(run, config, bars, signals))
}

/// Restrict aligned bars/signals to `[from, to]` (inclusive).
pub fn slice_by_date<'a>(
    bars: &'a [Bar],
    signals: &'a [Signal],
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<(&'a [Bar], &'a [Signal]), RunError> {
    let (start, end) = goldlab_core::domain::date_range(bars, from, to);
    if start >= end || signals.len() < end {
        let (data_start, data_end) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f.timestamp, l.timestamp),
            _ => (from, from),
        };
        return Err(RunError::EmptyRange {
            from,
            to,
            data_start,
            data_end,
        });
    }
    Ok((&bars[start..end], &signals[start..end]))
}

// ─── Baseline comparison ─────────────────────────────────────────────

/// The selected threshold against trading every directional signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub selected: BacktestSummary,
    pub baseline: BacktestSummary,
    pub pnl_delta: f64,
    pub win_rate_delta: f64,
    pub trade_count_delta: i64,
}

/// Run the aggregator at `threshold` and at 0.0 and report both.
pub fn compare_with_baseline(
    bars: &[Bar],
    signals: &[Signal],
    config: &TradingConfig,
    threshold: f64,
) -> Result<BaselineComparison, RunError> {
    let selected = run_backtest(bars, signals, threshold, config)?.summary;
    let baseline = run_backtest(bars, signals, 0.0, config)?.summary;
    info!(
        threshold,
        selected_trades = selected.trade_count,
        baseline_trades = baseline.trade_count,
        "baseline comparison complete"
    );
    Ok(BaselineComparison {
        pnl_delta: selected.total_pnl - baseline.total_pnl,
        win_rate_delta: selected.win_rate - baseline.win_rate,
        trade_count_delta: selected.trade_count as i64 - baseline.trade_count as i64,
        selected,
        baseline,
    })
}
