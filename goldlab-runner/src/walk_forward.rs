//! Date-window validation — backtest a fixed threshold over named calendar windows.
//!
//! Each `[[windows]]` entry is evaluated independently on its own bar slice,
//! with capital reset to the configured initial value. Windows too short to
//! be meaningful are skipped and reported rather than silently dropped.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use goldlab_core::domain::{date_range, validate_bars, validate_signals, Bar, Signal};
use goldlab_core::engine::{EngineError, TradingConfig};

use crate::metrics::BacktestSummary;
use crate::runner::{run_backtest, RunError};

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("no windows configured")]
    NoWindows,
    #[error("window '{name}' starts at {start} after it ends at {end}")]
    Inverted {
        name: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

// ─── Types ───────────────────────────────────────────────────────────

/// A named, inclusive calendar range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowOutcome {
    Completed(Box<BacktestSummary>),
    /// Fewer than the configured minimum bars.
    Skipped { bars: usize },
    /// The window does not overlap the data at all.
    OutOfRange {
        data_start: NaiveDateTime,
        data_end: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub spec: WindowSpec,
    pub bars: usize,
    pub outcome: WindowOutcome,
}

impl WindowResult {
    pub fn summary(&self) -> Option<&BacktestSummary> {
        match &self.outcome {
            WindowOutcome::Completed(s) => Some(s),
            _ => None,
        }
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Backtest every window at `threshold`. Results keep the input order.
pub fn run_windows(
    bars: &[Bar],
    signals: &[Signal],
    trading: &TradingConfig,
    windows: &[WindowSpec],
    threshold: f64,
    min_bars: usize,
) -> Result<Vec<WindowResult>, RunError> {
    if windows.is_empty() {
        return Err(WindowError::NoWindows.into());
    }
    if let Some(w) = windows.iter().find(|w| w.start > w.end) {
        return Err(WindowError::Inverted {
            name: w.name.clone(),
            start: w.start,
            end: w.end,
        }
        .into());
    }
    validate_bars(bars).map_err(EngineError::from)?;
    validate_signals(bars, signals).map_err(EngineError::from)?;

    let mut results = Vec::with_capacity(windows.len());
    for spec in windows {
        let (start, end) = date_range(bars, spec.start, spec.end);
        let n = end - start;

        let outcome = if n == 0 {
            match (bars.first(), bars.last()) {
                (Some(first), Some(last)) => {
                    warn!(
                        window = %spec.name,
                        data_start = %first.timestamp,
                        data_end = %last.timestamp,
                        "window outside data range"
                    );
                    WindowOutcome::OutOfRange {
                        data_start: first.timestamp,
                        data_end: last.timestamp,
                    }
                }
                _ => WindowOutcome::Skipped { bars: 0 },
            }
        } else if n < min_bars {
            warn!(window = %spec.name, bars = n, min_bars, "window ignored (insufficient data)");
            WindowOutcome::Skipped { bars: n }
        } else {
            let run = run_backtest(&bars[start..end], &signals[start..end], threshold, trading)?;
            info!(
                window = %spec.name,
                bars = n,
                trades = run.summary.trade_count,
                win_rate = run.summary.win_rate,
                "window complete"
            );
            WindowOutcome::Completed(Box::new(run.summary))
        };

        results.push(WindowResult {
            spec: spec.clone(),
            bars: n,
            outcome,
        });
    }
    Ok(results)
}
