//! GoldLab CLI — backtest, threshold sweep, labelling, calibration and window commands.
//!
//! Commands:
//! - `backtest` — run the aggregator at one threshold and save artifacts
//! - `sweep` — sweep a threshold grid, select by objective, re-run the winner
//! - `label` — resolve WIN/LOSS/TIMEOUT labels for every bar
//! - `calibrate` — reliability curve, Brier score and ECE of the probabilities
//! - `windows` — backtest each configured date window at a fixed threshold

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use goldlab_core::domain::{Bar, Signal};
use goldlab_core::engine::TradingConfig;
use goldlab_runner::export::{
    export_labels_csv, generate_report, save_artifacts, save_reliability, save_sweep,
};
use goldlab_runner::{
    compare_with_baseline, label_outcomes, load_data, prediction_pairs, run_backtest,
    run_windows, slice_by_date, CalibrationReport, LabelCounts, Selection, StudyConfig,
    SweepMode, ThresholdSweep, WindowOutcome,
};

#[derive(Parser)]
#[command(
    name = "goldlab",
    about = "GoldLab CLI — bar-by-bar backtests for a gold WIN/LOSS classifier"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Data and configuration options shared by every command.
#[derive(Args)]
struct Common {
    /// Study config (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prediction table (CSV); overrides `[data].path`.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Use seeded synthetic data instead of a CSV.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Trading profile: legacy_atr, break_even, final_240, fixed_rr4.
    #[arg(long)]
    profile: Option<String>,

    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    WinRate,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest at a fixed probability threshold.
    Backtest {
        #[command(flatten)]
        common: Common,

        /// Minimum predicted probability to take a trade.
        #[arg(long, default_value_t = 0.60)]
        threshold: f64,

        /// Also run the take-every-signal baseline and print the deltas.
        #[arg(long, default_value_t = false)]
        baseline: bool,

        /// Artifact directory (manifest.json, trades.csv, equity.csv).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sweep thresholds and select one by the configured objective.
    Sweep {
        #[command(flatten)]
        common: Common,

        /// Evaluation mode; overrides `[sweep].mode`.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Evaluate thresholds one at a time.
        #[arg(long, default_value_t = false)]
        serial: bool,

        /// Artifact directory (adds sweep.csv to the run artifacts).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Label every bar with the outcome of the trade it would open.
    Label {
        #[command(flatten)]
        common: Common,

        /// Output CSV (time, label, target).
        #[arg(long, default_value = "labels.csv")]
        out: PathBuf,
    },
    /// Reliability curve and calibration error of the classifier's probabilities.
    Calibrate {
        #[command(flatten)]
        common: Common,

        /// Number of equal-width probability bins.
        #[arg(long, default_value_t = 10)]
        bins: usize,

        /// Directory for reliability.csv.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Backtest each `[[windows]]` entry of the study config.
    Windows {
        #[command(flatten)]
        common: Common,

        /// Threshold override for `[window_options].threshold`.
        #[arg(long)]
        threshold: Option<f64>,

        /// Minimum bars override for `[window_options].min_bars`.
        #[arg(long)]
        min_bars: Option<usize>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            common,
            threshold,
            baseline,
            out,
        } => run_backtest_cmd(&common, threshold, baseline, out),
        Commands::Sweep {
            common,
            mode,
            serial,
            out,
        } => run_sweep_cmd(&common, mode, serial, out),
        Commands::Label { common, out } => run_label_cmd(&common, out),
        Commands::Calibrate { common, bins, out } => run_calibrate_cmd(&common, bins, out),
        Commands::Windows {
            common,
            threshold,
            min_bars,
        } => run_windows_cmd(&common, threshold, min_bars),
    }
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

// ─── Shared setup ────────────────────────────────────────────────────

struct Session {
    study: StudyConfig,
    trading: TradingConfig,
    bars: Vec<Bar>,
    signals: Vec<Signal>,
}

fn open_session(common: &Common) -> Result<Session> {
    let mut study = match &common.config {
        Some(path) => StudyConfig::load(path)?,
        None => StudyConfig::default(),
    };
    if common.data.is_some() && common.synthetic {
        bail!("--data and --synthetic are mutually exclusive");
    }
    if let Some(path) = &common.data {
        study.data.path = Some(path.clone());
    }
    if common.synthetic {
        study.data.path = None;
        study.data.synthetic = true;
    }
    if let Some(profile) = &common.profile {
        study.trading.profile = Some(profile.clone());
    }
    let trading = study.trading_config()?;

    let data = load_data(&study.data)?;
    if data.is_synthetic() {
        println!("NOTE: running on synthetic data");
    }

    let (bars, signals) = match (common.from, common.to) {
        (None, None) => (data.bars, data.signals),
        (from, to) => {
            let from = from.map_or(NaiveDateTime::MIN, day_start);
            let to = to.map_or(NaiveDateTime::MAX, day_end);
            let (b, s) = slice_by_date(&data.bars, &data.signals, from, to)?;
            (b.to_vec(), s.to_vec())
        }
    };
    info!(bars = bars.len(), "session ready");

    Ok(Session {
        study,
        trading,
        bars,
        signals,
    })
}

fn day_start(d: NaiveDate) -> NaiveDateTime {
    d.and_time(chrono::NaiveTime::MIN)
}

fn day_end(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_opt(23, 59, 59).unwrap_or_else(|| day_start(d))
}

// ─── Commands ────────────────────────────────────────────────────────

fn run_backtest_cmd(
    common: &Common,
    threshold: f64,
    baseline: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let s = open_session(common)?;
    let run = run_backtest(&s.bars, &s.signals, threshold, &s.trading)?;
    println!("{}", generate_report(&run));

    if baseline {
        let cmp = compare_with_baseline(&s.bars, &s.signals, &s.trading, threshold)?;
        println!("=== Baseline (every directional signal) ===");
        println!(
            "Trades:   {} vs {} ({:+})",
            cmp.selected.trade_count, cmp.baseline.trade_count, cmp.trade_count_delta
        );
        println!(
            "Win rate: {:.2}% vs {:.2}% ({:+.2} pts)",
            cmp.selected.win_rate * 100.0,
            cmp.baseline.win_rate * 100.0,
            cmp.win_rate_delta * 100.0
        );
        println!(
            "P&L:      ${:.2} vs ${:.2} ({:+.2})",
            cmp.selected.total_pnl, cmp.baseline.total_pnl, cmp.pnl_delta
        );
    }

    if let Some(dir) = out {
        save_artifacts(&run, &dir)?;
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn run_sweep_cmd(
    common: &Common,
    mode: Option<ModeArg>,
    serial: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let s = open_session(common)?;
    let section = &s.study.sweep;
    let mode = match mode {
        Some(ModeArg::Full) => SweepMode::FullBacktest,
        Some(ModeArg::WinRate) => SweepMode::WinRateOnly,
        None => section.mode,
    };
    let grid = section.grid()?;
    let sweep = ThresholdSweep::new(s.trading.clone())
        .with_mode(mode)
        .with_parallelism(section.parallel && !serial);

    let report = sweep.optimize(&s.bars, &s.signals, &grid, &section.objective, None)?;

    println!(
        "{:>9} {:>8} {:>8} {:>9} {:>12} {:>8}",
        "threshold", "signals", "trades", "win_rate", "total_pnl", "sharpe"
    );
    for r in &report.table.rows {
        println!(
            "{:>9.2} {:>8} {:>8} {:>8.2}% {:>12.2} {:>8.3}",
            r.threshold,
            r.qualifying_signals,
            r.trade_count,
            r.win_rate * 100.0,
            r.total_pnl,
            r.sharpe
        );
    }
    println!();
    match &report.selection {
        Selection::Met { threshold, row } => println!(
            "Selected threshold {threshold:.2}: {} trades, {:.2}% win rate",
            row.trade_count,
            row.win_rate * 100.0
        ),
        Selection::Degraded {
            threshold,
            target,
            achieved,
            ..
        } => println!(
            "Target {:.2}% not reached; best threshold {threshold:.2} achieved {:.2}%",
            target * 100.0,
            achieved * 100.0
        ),
    }
    println!("{}", generate_report(&report.final_run));

    if let Some(dir) = out {
        save_artifacts(&report.final_run, &dir)?;
        save_sweep(&report.table, &dir)?;
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn run_label_cmd(common: &Common, out: PathBuf) -> Result<()> {
    let s = open_session(common)?;
    let labels = label_outcomes(&s.bars, &s.signals, &s.trading)?;
    let counts = LabelCounts::tally(&labels);
    println!(
        "win {} | loss {} | timeout {} | no_trade {} | invalid {} | win rate {:.2}%",
        counts.win,
        counts.loss,
        counts.timeout,
        counts.no_trade,
        counts.invalid,
        counts.win_rate() * 100.0
    );
    let csv = export_labels_csv(&s.bars, &labels)?;
    std::fs::write(&out, csv).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Labels saved to: {}", out.display());
    Ok(())
}

fn run_calibrate_cmd(common: &Common, bins: usize, out: Option<PathBuf>) -> Result<()> {
    let s = open_session(common)?;
    let pairs = if s.signals.iter().any(|sig| sig.label.is_some()) {
        prediction_pairs(&s.signals, None)
    } else {
        let labels = label_outcomes(&s.bars, &s.signals, &s.trading)?;
        prediction_pairs(&s.signals, Some(&labels))
    };
    let Some(report) = CalibrationReport::compute(&pairs, bins) else {
        bail!("no labelled predictions to calibrate against (bins = {bins})");
    };

    println!(
        "samples {} | brier {:.4} | ECE {:.4} | MCE {:.4}",
        report.sample_size, report.brier_score, report.ece, report.mce
    );
    println!("{:>11} {:>10} {:>10} {:>7}", "bin", "predicted", "actual", "count");
    for b in &report.bins {
        println!(
            "{:>5.2}-{:<5.2} {:>10.4} {:>10.4} {:>7}",
            b.bin_lower, b.bin_upper, b.avg_predicted, b.actual_win_rate, b.count
        );
    }

    if let Some(dir) = out {
        save_reliability(&report.bins, &dir)?;
        println!("Reliability curve saved to: {}", dir.display());
    }
    Ok(())
}

fn run_windows_cmd(common: &Common, threshold: Option<f64>, min_bars: Option<usize>) -> Result<()> {
    let s = open_session(common)?;
    if s.study.windows.is_empty() {
        bail!("no [[windows]] in the study config");
    }
    let threshold = threshold.unwrap_or(s.study.window_options.threshold);
    let min_bars = min_bars.unwrap_or(s.study.window_options.min_bars);
    let results = run_windows(
        &s.bars,
        &s.signals,
        &s.trading,
        &s.study.windows,
        threshold,
        min_bars,
    )?;

    for r in &results {
        match &r.outcome {
            WindowOutcome::Completed(sum) => println!(
                "{:<16} {:>6} bars {:>5} trades {:>7.2}% win {:>12.2} pnl",
                r.spec.name,
                r.bars,
                sum.trade_count,
                sum.win_rate * 100.0,
                sum.total_pnl
            ),
            WindowOutcome::Skipped { bars } => println!(
                "{:<16} skipped: {bars} bars (minimum {min_bars})",
                r.spec.name
            ),
            WindowOutcome::OutOfRange {
                data_start,
                data_end,
            } => println!(
                "{:<16} outside data ({data_start} to {data_end})",
                r.spec.name
            ),
        }
    }
    Ok(())
}
