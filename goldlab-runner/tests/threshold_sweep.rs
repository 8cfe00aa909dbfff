//! BDD tests for the threshold sweep and selection on synthetic data.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use goldlab_core::engine::{Profile, TradingConfig};
use goldlab_runner::data_loader::generate_synthetic;
use goldlab_runner::optimizer::{
    Objective, OptimizeError, SweepMode, ThresholdGrid, ThresholdSweep,
};
use goldlab_runner::runner::{run_backtest, RunError};

fn grid() -> ThresholdGrid {
    ThresholdGrid::range(0.50, 0.66, 0.02).unwrap()
}

#[test]
fn bdd_parallel_sweep_matches_serial() {
    // GIVEN synthetic data and an 8-point grid
    let data = generate_synthetic(1_500, 17);
    let cfg = Profile::BreakEven.config();

    // WHEN swept serially and on rayon
    let serial = ThresholdSweep::new(cfg.clone())
        .with_parallelism(false)
        .sweep(&data.bars, &data.signals, &grid())
        .unwrap();
    let parallel = ThresholdSweep::new(cfg)
        .with_parallelism(true)
        .sweep(&data.bars, &data.signals, &grid())
        .unwrap();

    // THEN the tables are identical and in grid order
    assert_eq!(serial.rows, parallel.rows);
    assert_eq!(serial.rows.len(), 8);
    assert!(serial.rows.windows(2).all(|w| w[0].threshold < w[1].threshold));
    assert!(!serial.interrupted);
}

#[test]
fn bdd_rows_match_single_runs() {
    // GIVEN a full-backtest sweep
    let data = generate_synthetic(800, 4);
    let cfg = TradingConfig::default();
    let table = ThresholdSweep::new(cfg.clone())
        .sweep(&data.bars, &data.signals, &grid())
        .unwrap();

    // THEN each row agrees with a standalone run at that threshold
    for row in &table.rows {
        let run = run_backtest(&data.bars, &data.signals, row.threshold, &cfg).unwrap();
        assert_eq!(row.trade_count, run.summary.trade_count);
        assert!((row.total_pnl - run.summary.total_pnl).abs() < 1e-9);
    }
}

#[test]
fn bdd_trade_counts_fall_as_threshold_rises() {
    let data = generate_synthetic(1_000, 8);
    let table = ThresholdSweep::new(TradingConfig::default())
        .with_mode(SweepMode::WinRateOnly)
        .sweep(&data.bars, &data.signals, &grid())
        .unwrap();
    assert!(table
        .rows
        .windows(2)
        .all(|w| w[0].qualifying_signals >= w[1].qualifying_signals));
    assert!(table.rows.iter().all(|r| r.max_drawdown == 0.0));
    assert!(table.rows.iter().all(|r| r.precision.is_some()));
}

#[test]
fn bdd_progress_reports_every_row() {
    let data = generate_synthetic(500, 2);
    let seen = AtomicUsize::new(0);
    let table = ThresholdSweep::new(TradingConfig::default())
        .sweep_with_progress(&data.bars, &data.signals, &grid(), None, |done, total, _| {
            assert!(done <= total);
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), table.rows.len());
}

#[test]
fn bdd_cancelled_sweep_is_interrupted() {
    // GIVEN a cancel flag that is already set
    let data = generate_synthetic(500, 6);
    let cancel = AtomicBool::new(true);
    let sweep = ThresholdSweep::new(TradingConfig::default()).with_parallelism(false);

    // WHEN sweeping
    let table = sweep
        .sweep_with_progress(&data.bars, &data.signals, &grid(), Some(&cancel), |_, _, _| {})
        .unwrap();

    // THEN nothing was evaluated and the table says so
    assert!(table.rows.is_empty());
    assert!(table.interrupted);

    // AND optimize surfaces the interruption
    let err = sweep
        .optimize(
            &data.bars,
            &data.signals,
            &grid(),
            &Objective::MaxWinRate { min_trades: 1 },
            Some(&cancel),
        )
        .unwrap_err();
    assert!(matches!(err, RunError::Optimize(OptimizeError::Interrupted)));
}

#[test]
fn bdd_optimize_reruns_at_selected_threshold() {
    // GIVEN a reachable minimum trade count
    let data = generate_synthetic(2_000, 12);
    let sweep = ThresholdSweep::new(TradingConfig::default());
    let objective = Objective::MaxSharpe { min_trades: 5 };

    // WHEN optimizing
    let report = sweep
        .optimize(&data.bars, &data.signals, &grid(), &objective, None)
        .unwrap();

    // THEN the final run is at the selected threshold and matches its row
    assert_eq!(report.final_run.threshold, report.selection.threshold());
    assert_eq!(
        report.final_run.summary.trade_count,
        report.selection.row().trade_count
    );
    assert!(!report.selection.is_degraded());
}

#[test]
fn bdd_unreachable_minimum_is_insufficient_data() {
    // GIVEN too few bars for the minimum trade count
    let data = generate_synthetic(150, 1);
    let sweep = ThresholdSweep::new(TradingConfig::default());

    // WHEN optimizing with a minimum of 10_000 trades
    let err = sweep
        .optimize(
            &data.bars,
            &data.signals,
            &grid(),
            &Objective::MaxWinRate { min_trades: 10_000 },
            None,
        )
        .unwrap_err();

    // THEN the error carries the grid bounds and the data range
    match err {
        RunError::Optimize(OptimizeError::InsufficientData {
            thresholds,
            min_trades,
            data_range,
            ..
        }) => {
            assert_eq!(thresholds, (0.50, 0.64));
            assert_eq!(min_trades, 10_000);
            assert!(data_range.is_some());
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}
