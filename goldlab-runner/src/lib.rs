//! GoldLab Runner — backtest orchestration on top of `goldlab-core`.
//!
//! This crate provides:
//! - CSV data loading with a seeded synthetic fallback
//! - Single-run backtests with summary statistics and run fingerprints
//! - Threshold sweep and selection (full backtest or win-rate-only)
//! - Outcome labelling and calibration diagnostics
//! - Date-window evaluation
//! - TOML study configuration and CSV/JSON artifact export

pub mod calibration;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod labeling;
pub mod metrics;
pub mod optimizer;
pub mod runner;
pub mod walk_forward;

pub use calibration::{
    brier_score, prediction_pairs, reliability_curve, CalibrationReport, ReliabilityBin,
};
pub use config::{ConfigError, DataConfig, StudyConfig, SweepSection, TradingSection};
pub use data_loader::{generate_synthetic, load_csv, load_data, DataSource, LoadError, LoadedData};
pub use labeling::{label_outcomes, LabelCounts, OutcomeLabel};
pub use metrics::BacktestSummary;
pub use optimizer::{
    select_threshold, Objective, OptimizeError, Selection, SweepMode, SweepRow, SweepTable,
    ThresholdGrid, ThresholdReport, ThresholdSweep,
};
pub use runner::{
    compare_with_baseline, run_backtest, run_backtest_with_cancel, slice_by_date,
    BacktestRun, BaselineComparison, RunError, SCHEMA_VERSION,
};
pub use walk_forward::{run_windows, WindowError, WindowOutcome, WindowResult, WindowSpec};
