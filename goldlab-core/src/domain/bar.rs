//! Bar — one time step of the enriched price series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV bar with its ATR and any pass-through indicator columns.
///
/// Bars are produced once by the data pipeline and are read-only to the engine.
/// `indicators` is aligned with the column names held by the loader; the
/// resolver never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Average true range. May be NaN or zero during indicator warm-up; such
    /// bars produce degenerate stops and are skipped as entries.
    pub atr: f64,
    #[serde(default)]
    pub indicators: Vec<f64>,
}

impl Bar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity: high bounds the body from above, low from below,
    /// prices positive, volume non-negative.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    /// True when the ATR can size a stop.
    pub fn has_usable_atr(&self) -> bool {
        self.atr.is_finite() && self.atr > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            open: 2040.0,
            high: 2046.5,
            low: 2037.2,
            close: 2044.1,
            volume: 5_321.0,
            atr: 6.4,
            indicators: vec![55.0, 21.3],
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_inverted_range() {
        let mut bar = sample_bar();
        bar.high = 2030.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn warmup_atr_is_not_usable() {
        let mut bar = sample_bar();
        bar.atr = f64::NAN;
        assert!(!bar.has_usable_atr());
        bar.atr = 0.0;
        assert!(!bar.has_usable_atr());
    }
}
