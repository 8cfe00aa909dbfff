//! Outcome labelling — what the trade opened at each bar would have done.
//!
//! Unlike the aggregator there is no timeout fallback: a trade that reaches
//! neither level within the horizon is labelled `Timeout`. The labels power
//! the win-rate-only sweep and serve as training targets.

use serde::{Deserialize, Serialize};
use std::fmt;

use goldlab_core::domain::{validate_bars, validate_signals, Bar, Outcome, Signal};
use goldlab_core::engine::{resolve_within_horizon, EngineError, EntryEvent, TradingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    Win,
    Loss,
    /// Neither level touched within the horizon.
    Timeout,
    /// Score implied no direction.
    NoTrade,
    /// Degenerate risk distance or no forward bars.
    Invalid,
}

impl OutcomeLabel {
    /// Integer encoding used in training tables: 1 win, 0 loss, −1 otherwise.
    pub fn as_target(self) -> i8 {
        match self {
            Self::Win => 1,
            Self::Loss => 0,
            Self::Timeout | Self::NoTrade | Self::Invalid => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Timeout => "timeout",
            Self::NoTrade => "no_trade",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label every bar. The result is aligned 1:1 with `bars`.
pub fn label_outcomes(
    bars: &[Bar],
    signals: &[Signal],
    trading: &TradingConfig,
) -> Result<Vec<OutcomeLabel>, EngineError> {
    trading.validate()?;
    validate_bars(bars)?;
    validate_signals(bars, signals)?;
    let policy = trading.break_even_policy();

    Ok(bars
        .iter()
        .zip(signals)
        .enumerate()
        .map(|(i, (bar, signal))| {
            let Some(direction) = signal.direction(trading.min_score_magnitude) else {
                return OutcomeLabel::NoTrade;
            };
            if !trading.levels.can_size(bar) {
                return OutcomeLabel::Invalid;
            }
            let levels = trading.levels.levels(direction, bar.close, bar.atr);
            let entry = EntryEvent {
                bar_index: i,
                direction,
                entry_price: bar.close,
                stop_price: levels.stop,
                target_price: levels.target,
            };
            match resolve_within_horizon(bars, &entry, trading.lookahead_horizon, policy) {
                Ok(Some(r)) if r.outcome == Outcome::Win => OutcomeLabel::Win,
                Ok(Some(_)) => OutcomeLabel::Loss,
                Ok(None) => OutcomeLabel::Timeout,
                Err(_) => OutcomeLabel::Invalid,
            }
        })
        .collect())
}

/// Counts per label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub win: usize,
    pub loss: usize,
    pub timeout: usize,
    pub no_trade: usize,
    pub invalid: usize,
}

impl LabelCounts {
    pub fn tally(labels: &[OutcomeLabel]) -> Self {
        let mut c = Self::default();
        for l in labels {
            match l {
                OutcomeLabel::Win => c.win += 1,
                OutcomeLabel::Loss => c.loss += 1,
                OutcomeLabel::Timeout => c.timeout += 1,
                OutcomeLabel::NoTrade => c.no_trade += 1,
                OutcomeLabel::Invalid => c.invalid += 1,
            }
        }
        c
    }

    /// Win share among resolved (win + loss) labels.
    pub fn win_rate(&self) -> f64 {
        let resolved = self.win + self.loss;
        if resolved == 0 {
            return 0.0;
        }
        self.win as f64 / resolved as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use goldlab_core::engine::Profile;

    fn bars(hlc: &[(f64, f64, f64)]) -> Vec<Bar> {
        let t0 = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        hlc.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: close,
                high,
                low,
                close,
                volume: 1.0,
                atr: 10.0,
                indicators: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn labels_each_bar() {
        let b = bars(&[
            (2001.0, 1999.0, 2000.0),
            (2061.0, 1999.0, 2000.0),
            (2005.0, 1990.0, 2000.0),
            (2005.0, 1995.0, 2000.0),
        ]);
        let s = vec![
            Signal::new(0.5, 2),
            Signal::new(0.5, 1),
            Signal::new(0.5, -2),
            Signal::new(0.5, 2),
        ];
        let labels = label_outcomes(&b, &s, &Profile::LegacyAtr.config()).unwrap();
        assert_eq!(
            labels,
            vec![
                OutcomeLabel::Win,
                OutcomeLabel::NoTrade,
                OutcomeLabel::Timeout,
                OutcomeLabel::Invalid,
            ]
        );
        assert_eq!(labels[0].as_target(), 1);
        assert_eq!(labels[2].as_target(), -1);
    }

    #[test]
    fn break_even_stop_labels_as_win() {
        let b = bars(&[
            (2001.0, 1999.0, 2000.0),
            (2016.0, 2001.0, 2010.0),
            (2002.0, 1984.0, 1990.0),
        ]);
        let s = vec![Signal::new(0.5, 3); 3];
        let be = label_outcomes(&b, &s, &Profile::BreakEven.config()).unwrap();
        let legacy = label_outcomes(&b, &s, &Profile::LegacyAtr.config()).unwrap();
        assert_eq!(be[0], OutcomeLabel::Win);
        assert_eq!(legacy[0], OutcomeLabel::Loss);
    }

    #[test]
    fn tally_and_win_rate() {
        let c = LabelCounts::tally(&[
            OutcomeLabel::Win,
            OutcomeLabel::Loss,
            OutcomeLabel::Loss,
            OutcomeLabel::Timeout,
        ]);
        assert_eq!(c.loss, 2);
        assert!((c.win_rate() - 1.0 / 3.0).abs() < 1e-12);
    }
}
