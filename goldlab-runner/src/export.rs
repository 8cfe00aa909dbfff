//! Artifact export — JSON manifest and CSV tables for a run.
//!
//! A run directory holds:
//! - `manifest.json` — the full `BacktestRun` (schema-versioned)
//! - `trades.csv` — one row per trade
//! - `equity.csv` — capital after each trade
//! - `sweep.csv` — threshold table, when a sweep was run
//! - `reliability.csv` — calibration bins, when labels were available
//!
//! Unknown future schema versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use goldlab_core::domain::{Bar, TradeRecord};

use crate::calibration::ReliabilityBin;
use crate::labeling::OutcomeLabel;
use crate::optimizer::SweepTable;
use crate::runner::{BacktestRun, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(run: &BacktestRun) -> Result<String> {
    serde_json::to_string_pretty(run).context("failed to serialize BacktestRun to JSON")
}

/// Deserialize a `BacktestRun`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestRun> {
    let run: BacktestRun =
        serde_json::from_str(json).context("failed to deserialize BacktestRun from JSON")?;
    if run.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            run.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(run)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_default()
}

pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_bar",
        "entry_time",
        "direction",
        "entry_price",
        "probability",
        "score",
        "initial_stop",
        "target",
        "atr",
        "risk_distance",
        "break_even_activated",
        "outcome",
        "exit_reason",
        "exit_bar",
        "exit_time",
        "exit_price",
        "bars_held",
        "pnl_pct",
        "risk_amount",
        "pnl",
        "capital_after",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_bar.to_string(),
            &t.entry_time.to_string(),
            &t.direction.to_string(),
            &format!("{:.5}", t.entry_price),
            &format!("{:.4}", t.probability),
            &t.score.to_string(),
            &format!("{:.5}", t.initial_stop),
            &format!("{:.5}", t.target),
            &format!("{:.5}", t.atr),
            &format!("{:.5}", t.risk_distance),
            &t.break_even_activated.to_string(),
            t.outcome.as_str(),
            t.exit_reason.as_str(),
            &t.exit_bar.to_string(),
            &t.exit_time.to_string(),
            &format!("{:.5}", t.exit_price),
            &t.bars_held.to_string(),
            &format!("{:.4}", t.pnl_pct),
            &format!("{:.2}", t.risk_amount),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.capital_after),
        ])?;
    }
    finish(wtr)
}

/// Capital path: row 0 is the initial capital, row k the capital after trade k.
pub fn export_equity_csv(initial_capital: f64, equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["trade", "capital"])?;
    wtr.write_record(["0", &format!("{initial_capital:.2}")])?;
    for (i, c) in equity_curve.iter().enumerate() {
        wtr.write_record([&(i + 1).to_string(), &format!("{c:.2}")])?;
    }
    finish(wtr)
}

pub fn export_sweep_csv(table: &SweepTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "threshold",
        "qualifying_signals",
        "trade_count",
        "wins",
        "losses",
        "win_rate",
        "total_pnl",
        "avg_win",
        "avg_loss",
        "profit_factor",
        "expectancy",
        "sharpe",
        "max_drawdown",
        "max_drawdown_pct",
        "precision",
        "recall",
        "f1",
    ])?;
    for r in &table.rows {
        wtr.write_record([
            &format!("{:.2}", r.threshold),
            &r.qualifying_signals.to_string(),
            &r.trade_count.to_string(),
            &r.wins.to_string(),
            &r.losses.to_string(),
            &format!("{:.4}", r.win_rate),
            &format!("{:.2}", r.total_pnl),
            &format!("{:.2}", r.avg_win),
            &format!("{:.2}", r.avg_loss),
            &format!("{:.4}", r.profit_factor),
            &format!("{:.4}", r.expectancy),
            &format!("{:.4}", r.sharpe),
            &format!("{:.2}", r.max_drawdown),
            &format!("{:.4}", r.max_drawdown_pct),
            &opt(r.precision),
            &opt(r.recall),
            &opt(r.f1),
        ])?;
    }
    finish(wtr)
}

pub fn export_reliability_csv(bins: &[ReliabilityBin]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bin_lower",
        "bin_upper",
        "avg_predicted",
        "actual_win_rate",
        "count",
    ])?;
    for b in bins {
        wtr.write_record([
            &format!("{:.2}", b.bin_lower),
            &format!("{:.2}", b.bin_upper),
            &format!("{:.4}", b.avg_predicted),
            &format!("{:.4}", b.actual_win_rate),
            &b.count.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Per-bar outcome labels, aligned with `bars`.
pub fn export_labels_csv(bars: &[Bar], labels: &[OutcomeLabel]) -> Result<String> {
    if bars.len() != labels.len() {
        bail!("{} bars but {} labels", bars.len(), labels.len());
    }
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "label", "target"])?;
    for (b, l) in bars.iter().zip(labels) {
        wtr.write_record([&b.timestamp.to_string(), l.as_str(), &l.as_target().to_string()])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Write `manifest.json`, `trades.csv` and `equity.csv` into `dir` (created if missing).
pub fn save_artifacts(run: &BacktestRun, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    write_file(dir, "manifest.json", &export_json(run)?)?;
    write_file(dir, "trades.csv", &export_trades_csv(&run.trades)?)?;
    write_file(
        dir,
        "equity.csv",
        &export_equity_csv(run.summary.initial_capital, &run.equity_curve)?,
    )?;
    Ok(())
}

pub fn save_sweep(table: &SweepTable, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    write_file(dir, "sweep.csv", &export_sweep_csv(table)?)
}

pub fn save_reliability(bins: &[ReliabilityBin], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    write_file(dir, "reliability.csv", &export_reliability_csv(bins)?)
}

/// Load a run from an artifact directory's `manifest.json`.
pub fn load_run(dir: &Path) -> Result<BacktestRun> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown ───────────────────────────────────────────────────────

/// Human-readable summary table for one run.
pub fn generate_report(run: &BacktestRun) -> String {
    let s = &run.summary;
    let mut md = String::with_capacity(1024);
    md.push_str("# Backtest Report\n\n");
    md.push_str("| Field | Value |\n| --- | --- |\n");
    if let (Some(start), Some(end)) = (run.start, run.end) {
        md.push_str(&format!("| Period | {start} to {end} |\n"));
    }
    md.push_str(&format!("| Bars | {} |\n", run.bar_count));
    md.push_str(&format!("| Threshold | {:.2} |\n", run.threshold));
    md.push_str(&format!("| Horizon | {} bars |\n", run.config.lookahead_horizon));
    md.push_str(&format!("| Break-even | {} |\n", run.config.use_break_even));
    md.push_str(&format!("| Config hash | `{}` |\n", &run.config_hash[..12.min(run.config_hash.len())]));
    md.push_str(&format!("| Dataset hash | `{}` |\n\n", &run.dataset_hash[..12.min(run.dataset_hash.len())]));

    md.push_str("| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", s.trade_count));
    md.push_str(&format!(
        "| Wins / Losses / Timeouts | {} / {} / {} |\n",
        s.wins, s.losses, s.timeouts
    ));
    md.push_str(&format!("| Win rate | {:.2}% |\n", s.win_rate * 100.0));
    md.push_str(&format!(
        "| Break-even win rate | {:.2}% |\n",
        s.breakeven_win_rate * 100.0
    ));
    md.push_str(&format!("| Total P&L | ${:.2} |\n", s.total_pnl));
    md.push_str(&format!("| Profit factor | {:.2} |\n", s.profit_factor));
    md.push_str(&format!("| Expectancy | ${:.2} |\n", s.expectancy));
    md.push_str(&format!("| Sharpe (per trade) | {:.3} |\n", s.sharpe));
    md.push_str(&format!(
        "| Max drawdown | ${:.2} ({:.2}%) |\n",
        s.max_drawdown, s.max_drawdown_pct
    ));
    md.push_str(&format!(
        "| Final capital | ${:.2} ({:+.2}%) |\n",
        s.final_capital, s.total_return_pct
    ));
    if run.interrupted {
        md.push_str("\n_Run was interrupted; results are partial._\n");
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::generate_synthetic;
    use crate::optimizer::{SweepMode, ThresholdGrid, ThresholdSweep};
    use crate::runner::run_backtest;
    use goldlab_core::engine::TradingConfig;

    fn sample_run() -> BacktestRun {
        let data = generate_synthetic(500, 21);
        run_backtest(&data.bars, &data.signals, 0.5, &TradingConfig::default()).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let run = sample_run();
        let restored = import_json(&export_json(&run).unwrap()).unwrap();
        assert_eq!(restored.schema_version, SCHEMA_VERSION);
        assert_eq!(restored.trades.len(), run.trades.len());
        assert_eq!(restored.config, run.config);
        assert_eq!(restored.config_hash, run.config_hash);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut run = sample_run();
        run.schema_version = 99;
        let err = import_json(&export_json(&run).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version 99"));
    }

    #[test]
    fn trades_csv_has_row_per_trade() {
        let run = sample_run();
        let csv = export_trades_csv(&run.trades).unwrap();
        assert_eq!(csv.lines().count(), run.trades.len() + 1);
        assert!(csv.starts_with("entry_bar,entry_time,direction"));
    }

    #[test]
    fn equity_csv_starts_at_initial_capital() {
        let csv = export_equity_csv(10_000.0, &[10_100.0, 10_050.0]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["trade,capital", "0,10000.00", "1,10100.00", "2,10050.00"]);
    }

    #[test]
    fn sweep_csv_leaves_missing_classification_blank() {
        let data = generate_synthetic(400, 2);
        let grid = ThresholdGrid::explicit(vec![0.5, 0.6]).unwrap();
        let table = ThresholdSweep::new(TradingConfig::default())
            .with_mode(SweepMode::FullBacktest)
            .sweep(&data.bars, &data.signals, &grid)
            .unwrap();
        let csv = export_sweep_csv(&table).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(1).unwrap().ends_with(",,,"));
    }

    #[test]
    fn labels_must_align() {
        let data = generate_synthetic(3, 1);
        assert!(export_labels_csv(&data.bars, &[OutcomeLabel::Win]).is_err());
    }

    #[test]
    fn save_load_artifacts_roundtrip() {
        let run = sample_run();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        save_artifacts(&run, &out).unwrap();
        save_reliability(&[], &out).unwrap();

        assert!(out.join("manifest.json").exists());
        assert!(out.join("trades.csv").exists());
        assert!(out.join("equity.csv").exists());
        assert!(out.join("reliability.csv").exists());

        let loaded = load_run(&out).unwrap();
        assert_eq!(loaded.dataset_hash, run.dataset_hash);
        assert_eq!(loaded.summary.trade_count, run.summary.trade_count);
    }

    #[test]
    fn report_mentions_key_metrics() {
        let md = generate_report(&sample_run());
        assert!(md.contains("Win rate"));
        assert!(md.contains("Profit factor"));
    }
}
