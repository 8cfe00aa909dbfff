//! Bar and signal loading for the runner.
//!
//! Reads a prediction table (one row per bar, classifier output already
//! attached) from CSV and returns aligned bars and signals. Fallback policy:
//! 1. If a CSV path is configured → load it
//! 2. If not and `synthetic` is enabled → generate a seeded random walk (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Malformed input fails here, at load time, naming the row and column.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use goldlab_core::domain::{validate_bars, Bar, SeriesError, Signal};
use goldlab_core::fingerprint::dataset_hash;

use crate::config::DataConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data source: set [data].path or enable synthetic data")]
    NoSource,

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("missing required column '{column}' (accepted names: {accepted})")]
    MissingColumn {
        column: &'static str,
        accepted: String,
    },

    #[error("row {row}, column '{column}': cannot parse '{value}'")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: probability {value} outside [0, 1]")]
    ProbabilityOutOfRange { row: usize, value: f64 },

    #[error("file contains no data rows")]
    Empty,

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

/// Where the loaded data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv(PathBuf),
    Synthetic { seed: u64 },
}

/// Loaded, validated bars with their aligned signals.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    pub signals: Vec<Signal>,
    /// Names of pass-through indicator columns, in `Bar::indicators` order.
    pub indicator_names: Vec<String>,
    /// BLAKE3 over all bar and signal values.
    pub dataset_hash: String,
    pub source: DataSource,
}

impl LoadedData {
    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, DataSource::Synthetic { .. })
    }

    pub fn has_labels(&self) -> bool {
        self.signals.iter().any(|s| s.label.is_some())
    }
}

/// Load data per the `[data]` section of a study config.
pub fn load_data(config: &DataConfig) -> Result<LoadedData, LoadError> {
    if let Some(path) = &config.path {
        return load_csv(path);
    }
    if config.synthetic {
        warn!(
            bars = config.synthetic_bars,
            seed = config.seed,
            "generating synthetic data; results are tagged as synthetic"
        );
        return Ok(generate_synthetic(config.synthetic_bars, config.seed));
    }
    Err(LoadError::NoSource)
}

// ─── CSV ─────────────────────────────────────────────────────────────

const TIME: &[&str] = &["time", "timestamp", "datetime", "date"];
const OPEN: &[&str] = &["open"];
const HIGH: &[&str] = &["high"];
const LOW: &[&str] = &["low"];
const CLOSE: &[&str] = &["close"];
const VOLUME: &[&str] = &["volume", "tick_volume"];
const ATR: &[&str] = &["atr", "atr14"];
const PROBABILITY: &[&str] = &["probability", "predicted_proba", "y_pred_proba"];
const SCORE: &[&str] = &["signal_score", "score"];
const LABEL: &[&str] = &["label", "target", "target_binary"];

struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    atr: usize,
    probability: usize,
    score: usize,
    label: Option<usize>,
    indicators: Vec<(usize, String)>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect();
        let find = |names: &[&str]| names.iter().find_map(|n| index.get(*n).copied());
        let require = |column: &'static str, names: &[&str]| {
            find(names).ok_or_else(|| LoadError::MissingColumn {
                column,
                accepted: names.join(", "),
            })
        };

        let mut cols = Self {
            time: require("time", TIME)?,
            open: require("open", OPEN)?,
            high: require("high", HIGH)?,
            low: require("low", LOW)?,
            close: require("close", CLOSE)?,
            volume: require("volume", VOLUME)?,
            atr: require("atr", ATR)?,
            probability: require("probability", PROBABILITY)?,
            score: require("signal_score", SCORE)?,
            label: find(LABEL),
            indicators: Vec::new(),
        };

        let mut used = vec![
            cols.time,
            cols.open,
            cols.high,
            cols.low,
            cols.close,
            cols.volume,
            cols.atr,
            cols.probability,
            cols.score,
        ];
        used.extend(cols.label);
        cols.indicators = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();
        Ok(cols)
    }
}

/// Load a prediction table from CSV.
pub fn load_csv(path: &Path) -> Result<LoadedData, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut cols = Columns::resolve(&headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.map_err(csv_err)?);
    }
    if rows.is_empty() {
        return Err(LoadError::Empty);
    }

    // Indicator columns whose first non-empty cell is not numeric (e.g. a
    // symbol column) are dropped rather than treated as errors.
    cols.indicators.retain(|(i, _)| {
        rows.iter()
            .map(|r| r[*i].trim())
            .find(|v| !v.is_empty())
            .map_or(true, |v| parse_f64(v).is_some())
    });

    let mut bars = Vec::with_capacity(rows.len());
    let mut signals = Vec::with_capacity(rows.len());
    for (row, record) in rows.iter().enumerate() {
        let field = |i: usize| &record[i];
        let number = |i: usize| {
            parse_f64(field(i)).ok_or_else(|| LoadError::Parse {
                row,
                column: headers[i].to_string(),
                value: field(i).to_string(),
            })
        };
        // Indicator warm-up rows leave ATR and pass-through columns empty.
        let optional = |i: usize| {
            if field(i).trim().is_empty() {
                Ok(f64::NAN)
            } else {
                number(i)
            }
        };

        let timestamp = parse_timestamp(field(cols.time)).ok_or_else(|| LoadError::Parse {
            row,
            column: headers[cols.time].to_string(),
            value: field(cols.time).to_string(),
        })?;

        let probability = number(cols.probability)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(LoadError::ProbabilityOutOfRange {
                row,
                value: probability,
            });
        }
        let raw_score = number(cols.score)?;
        if raw_score.fract() != 0.0 || raw_score.abs() > i32::MAX as f64 {
            return Err(LoadError::Parse {
                row,
                column: headers[cols.score].to_string(),
                value: field(cols.score).to_string(),
            });
        }

        let indicators = cols
            .indicators
            .iter()
            .map(|(i, _)| optional(*i))
            .collect::<Result<Vec<_>, _>>()?;

        bars.push(Bar {
            timestamp,
            open: number(cols.open)?,
            high: number(cols.high)?,
            low: number(cols.low)?,
            close: number(cols.close)?,
            volume: number(cols.volume)?,
            atr: optional(cols.atr)?,
            indicators,
        });
        signals.push(Signal {
            probability,
            score: raw_score as i32,
            label: cols.label.and_then(|i| parse_label(field(i))),
        });
    }

    validate_bars(&bars)?;
    let hash = dataset_hash(&bars, &signals).0;
    info!(
        path = %path.display(),
        bars = bars.len(),
        indicators = cols.indicators.len(),
        "loaded prediction table"
    );

    Ok(LoadedData {
        bars,
        signals,
        indicator_names: cols.indicators.into_iter().map(|(_, name)| name).collect(),
        dataset_hash: hash,
        source: DataSource::Csv(path.to_path_buf()),
    })
}

fn parse_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// 0/1 (or false/true) map to a label; anything else (e.g. -1 for timeout) is unlabelled.
fn parse_label(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "1.0" | "true" | "True" => Some(true),
        "0" | "0.0" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ─── Synthetic ───────────────────────────────────────────────────────

/// Generate `n` hourly bars of a gold-like random walk with a noisy
/// classifier attached. Deterministic for a given seed.
///
/// Probabilities are mildly informative about the next day's move so that
/// threshold sweeps have something to find.
pub fn generate_synthetic(n: usize, seed: u64) -> LoadedData {
    const ATR_PERIOD: usize = 14;
    const PEEK: usize = 24;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(n);
    let mut t = NaiveDate::from_ymd_opt(2023, 1, 2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let mut price = 1950.0_f64;
    let mut prev_close = price;
    let mut atr = 0.0_f64;

    while bars.len() < n {
        let weekday = t.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            t += Duration::hours(1);
            continue;
        }
        let open = price;
        let close = (price + rng.gen_range(-6.0..6.0)).max(100.0);
        let high = open.max(close) + rng.gen_range(0.0..4.0);
        let low = open.min(close) - rng.gen_range(0.0..4.0);
        let true_range = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        let k = bars.len().min(ATR_PERIOD - 1) as f64;
        atr = (atr * k + true_range) / (k + 1.0);

        bars.push(Bar {
            timestamp: t,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(500.0..5_000.0),
            atr,
            indicators: Vec::new(),
        });
        prev_close = close;
        price = close;
        t += Duration::hours(1);
    }

    let signals: Vec<Signal> = (0..bars.len())
        .map(|i| {
            let score: i32 = rng.gen_range(-4..=4);
            let ahead = bars[(i + PEEK).min(bars.len() - 1)].close;
            let dir = f64::from(score.signum());
            let edge = if bars[i].atr > 0.0 {
                dir * (ahead - bars[i].close) / bars[i].atr
            } else {
                0.0
            };
            let noise: f64 = rng.gen_range(-0.15..0.15);
            let probability = (0.55 + 0.08 * edge.tanh() + noise).clamp(0.0, 1.0);
            Signal::new(probability, score)
        })
        .collect();

    let hash = dataset_hash(&bars, &signals).0;
    LoadedData {
        bars,
        signals,
        indicator_names: Vec::new(),
        dataset_hash: hash,
        source: DataSource::Synthetic { seed },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldlab_core::domain::validate_signals;

    #[test]
    fn synthetic_is_deterministic_and_valid() {
        let a = generate_synthetic(300, 42);
        let b = generate_synthetic(300, 42);
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.bars.len(), 300);
        validate_bars(&a.bars).unwrap();
        validate_signals(&a.bars, &a.signals).unwrap();
        assert!(a.is_synthetic());
        assert!(!a.has_labels());
        assert!(a.bars.iter().all(|b| b.has_usable_atr()));
    }

    #[test]
    fn synthetic_seed_changes_data() {
        assert_ne!(
            generate_synthetic(100, 1).dataset_hash,
            generate_synthetic(100, 2).dataset_hash
        );
    }

    #[test]
    fn synthetic_skips_weekends() {
        let data = generate_synthetic(200, 5);
        assert!(data.bars.iter().all(|b| {
            let d = b.timestamp.weekday();
            d != chrono::Weekday::Sat && d != chrono::Weekday::Sun
        }));
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-02 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 13:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 13:00"), Some(expected));
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn labels() {
        assert_eq!(parse_label("1"), Some(true));
        assert_eq!(parse_label("0.0"), Some(false));
        assert_eq!(parse_label("-1"), None);
        assert_eq!(parse_label(""), None);
    }

    #[test]
    fn no_source_is_an_error() {
        let cfg = DataConfig {
            path: None,
            synthetic: false,
            ..DataConfig::default()
        };
        assert!(matches!(load_data(&cfg), Err(LoadError::NoSource)));
    }
}
