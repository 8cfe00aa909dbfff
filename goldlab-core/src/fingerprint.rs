//! Run fingerprinting — deterministic identity of a configuration and a data set.
//!
//! - `ConfigHash`: BLAKE3 over the canonical JSON of a [`TradingConfig`].
//! - `DatasetHash`: BLAKE3 over every bar and signal value, in series order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Bar, Signal};
use crate::engine::TradingConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of the full trading configuration.
pub fn config_hash(config: &TradingConfig) -> ConfigHash {
    // Struct field order is fixed, so the JSON is canonical.
    let json = serde_json::to_string(config).expect("TradingConfig must serialize");
    ConfigHash::from_bytes(json.as_bytes())
}

/// Content hash over bars and their aligned signals.
pub fn dataset_hash(bars: &[Bar], signals: &[Signal]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(bars.len() as u64).to_le_bytes());
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume, bar.atr] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
        for v in &bar.indicators {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    hasher.update(&(signals.len() as u64).to_le_bytes());
    for signal in signals {
        hasher.update(&signal.probability.to_bits().to_le_bytes());
        hasher.update(&signal.score.to_le_bytes());
        let label: u8 = match signal.label {
            None => 0,
            Some(false) => 1,
            Some(true) => 2,
        };
        hasher.update(&[label]);
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Profile;
    use chrono::NaiveDate;

    fn sample() -> (Vec<Bar>, Vec<Signal>) {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bar = Bar {
            timestamp: t,
            open: 2000.0,
            high: 2005.0,
            low: 1995.0,
            close: 2001.0,
            volume: 10.0,
            atr: 8.0,
            indicators: vec![55.0],
        };
        (vec![bar], vec![Signal::new(0.6, 2)])
    }

    #[test]
    fn config_hash_distinguishes_profiles() {
        let a = config_hash(&Profile::LegacyAtr.config());
        let b = config_hash(&Profile::BreakEven.config());
        assert_ne!(a, b);
        assert_eq!(a, config_hash(&Profile::LegacyAtr.config()));
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn dataset_hash_tracks_values() {
        let (bars, signals) = sample();
        let h1 = dataset_hash(&bars, &signals);
        assert_eq!(h1, dataset_hash(&bars, &signals));

        let mut relabelled = signals.clone();
        relabelled[0].label = Some(true);
        assert_ne!(h1, dataset_hash(&bars, &relabelled));

        let mut moved = bars.clone();
        moved[0].close = 2001.5;
        assert_ne!(h1, dataset_hash(&moved, &signals));
    }
}
