//! Series validation — fail fast on malformed bar and signal streams.

use chrono::NaiveDateTime;
use thiserror::Error;

use super::bar::Bar;
use super::signal::Signal;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar series is empty")]
    Empty,
    #[error("bar {index} at {timestamp} is not after the previous bar")]
    Unsorted {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("bar {index} duplicates timestamp {timestamp}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("bar {index} at {timestamp} has invalid OHLC values")]
    InsaneBar {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("signal stream has {signals} entries but bar series has {bars}")]
    LengthMismatch { bars: usize, signals: usize },
    #[error("signal {index} probability {value} is outside [0, 1]")]
    ProbabilityOutOfRange { index: usize, value: f64 },
}

/// Check ordering, uniqueness and OHLC sanity of a bar series.
pub fn validate_bars(bars: &[Bar]) -> Result<(), SeriesError> {
    if bars.is_empty() {
        return Err(SeriesError::Empty);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(SeriesError::InsaneBar {
                index,
                timestamp: bar.timestamp,
            });
        }
        if index > 0 {
            let prev = bars[index - 1].timestamp;
            if bar.timestamp == prev {
                return Err(SeriesError::DuplicateTimestamp {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if bar.timestamp < prev {
                return Err(SeriesError::Unsorted {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}

/// Check that signals align with bars and carry valid probabilities.
pub fn validate_signals(bars: &[Bar], signals: &[Signal]) -> Result<(), SeriesError> {
    if bars.len() != signals.len() {
        return Err(SeriesError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }
    for (index, signal) in signals.iter().enumerate() {
        if !(0.0..=1.0).contains(&signal.probability) {
            return Err(SeriesError::ProbabilityOutOfRange {
                index,
                value: signal.probability,
            });
        }
    }
    Ok(())
}

/// Index range `[start, end)` of bars whose timestamps fall inside
/// `[from, to]`. Bars must be sorted.
pub fn date_range(bars: &[Bar], from: NaiveDateTime, to: NaiveDateTime) -> (usize, usize) {
    let start = bars.partition_point(|b| b.timestamp < from);
    let end = bars.partition_point(|b| b.timestamp <= to);
    (start, end.max(start))
}
