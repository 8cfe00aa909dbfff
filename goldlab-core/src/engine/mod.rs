//! Backtesting engine — trade resolution and the threshold-filtered aggregator loop.
//!
//! Each qualifying bar opens a trade at its close, resolved independently
//! against the following bars:
//!
//! 1. Levels: stop and target from the entry bar (ATR or percent model)
//! 2. Resolution: break-even, stop, target, in that order per forward bar
//! 3. Accounting: P&L under the configured risk and P&L modes, capital path

pub mod accounting;
pub mod config;
pub mod loop_runner;
pub mod resolver;

use thiserror::Error;

use crate::domain::SeriesError;

pub use accounting::{trade_pnl, CapitalTracker};
pub use config::{PnlMode, PositionLimit, Profile, RiskMode, TradingConfig};
pub use loop_runner::{run_backtest, run_backtest_with_cancel, EngineRun, SignalCounts};
pub use resolver::{
    resolve_trade, resolve_within_horizon, EntryEvent, InvalidTradeError, InvalidTradeReason,
    Resolution,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input series: {0}")]
    Series(#[from] SeriesError),

    #[error("invalid trading config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("probability threshold must be finite, got {0}")]
    InvalidThreshold(f64),
}
