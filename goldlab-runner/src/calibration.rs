//! Calibration diagnostics — how well predicted probabilities match realised win rates.

use serde::{Deserialize, Serialize};

use goldlab_core::domain::Signal;

use crate::labeling::OutcomeLabel;

/// A bin in the reliability diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityBin {
    pub bin_lower: f64,
    pub bin_upper: f64,
    /// Average predicted probability in this bin
    pub avg_predicted: f64,
    /// Actual fraction of wins in this bin
    pub actual_win_rate: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Expected Calibration Error (count-weighted mean |predicted − actual|)
    pub ece: f64,
    /// Maximum Calibration Error over non-empty bins
    pub mce: f64,
    pub brier_score: f64,
    pub sample_size: usize,
    pub bins: Vec<ReliabilityBin>,
}

impl CalibrationReport {
    /// `None` when there are no labelled predictions.
    pub fn compute(pairs: &[(f64, bool)], n_bins: usize) -> Option<Self> {
        if pairs.is_empty() || n_bins == 0 {
            return None;
        }
        let bins = reliability_curve(pairs, n_bins);
        let n = pairs.len() as f64;
        let mut ece = 0.0;
        let mut mce: f64 = 0.0;
        for bin in &bins {
            let err = (bin.avg_predicted - bin.actual_win_rate).abs();
            ece += err * bin.count as f64 / n;
            mce = mce.max(err);
        }
        Some(Self {
            ece,
            mce,
            brier_score: brier_score(pairs),
            sample_size: pairs.len(),
            bins,
        })
    }
}

/// Equal-width bins over [0, 1]; empty bins are omitted and p = 1.0 falls in the last bin.
pub fn reliability_curve(pairs: &[(f64, bool)], n_bins: usize) -> Vec<ReliabilityBin> {
    if n_bins == 0 {
        return Vec::new();
    }
    let mut sums = vec![(0.0_f64, 0usize, 0usize); n_bins];
    for &(p, won) in pairs {
        let idx = ((p * n_bins as f64) as usize).min(n_bins - 1);
        let (sum, wins, count) = &mut sums[idx];
        *sum += p;
        *count += 1;
        if won {
            *wins += 1;
        }
    }
    let width = 1.0 / n_bins as f64;
    sums.into_iter()
        .enumerate()
        .filter(|(_, (_, _, count))| *count > 0)
        .map(|(i, (sum, wins, count))| ReliabilityBin {
            bin_lower: i as f64 * width,
            bin_upper: (i + 1) as f64 * width,
            avg_predicted: sum / count as f64,
            actual_win_rate: wins as f64 / count as f64,
            count,
        })
        .collect()
}

/// Mean squared error of probabilities against 0/1 outcomes.
pub fn brier_score(pairs: &[(f64, bool)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    pairs
        .iter()
        .map(|&(p, won)| {
            let y = if won { 1.0 } else { 0.0 };
            (p - y).powi(2)
        })
        .sum::<f64>()
        / pairs.len() as f64
}

/// (probability, won) pairs for every labelled bar.
///
/// A signal's own label wins; otherwise resolved WIN/LOSS outcome labels are
/// used when given. Timeouts and untradeable bars are left out.
pub fn prediction_pairs(signals: &[Signal], labels: Option<&[OutcomeLabel]>) -> Vec<(f64, bool)> {
    signals
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let won = s.label.or_else(|| match labels.and_then(|l| l.get(i)) {
                Some(OutcomeLabel::Win) => Some(true),
                Some(OutcomeLabel::Loss) => Some(false),
                _ => None,
            })?;
            Some((s.probability, won))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_calibration_has_zero_ece() {
        // 0.25 bin: 1 of 4 wins; 0.75 bin: 3 of 4 wins
        let mut pairs = vec![(0.25, true), (0.25, false), (0.25, false), (0.25, false)];
        pairs.extend([(0.75, true), (0.75, true), (0.75, true), (0.75, false)]);
        let report = CalibrationReport::compute(&pairs, 10).unwrap();
        assert_eq!(report.bins.len(), 2);
        assert!(report.ece.abs() < 1e-12);
        assert!(report.mce.abs() < 1e-12);
    }

    #[test]
    fn probability_one_lands_in_last_bin() {
        let bins = reliability_curve(&[(1.0, true), (0.0, false)], 10);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[1].bin_lower, 0.9);
        assert_eq!(bins[0].bin_lower, 0.0);
    }

    #[test]
    fn brier_values() {
        assert_eq!(brier_score(&[(1.0, true), (0.0, false)]), 0.0);
        assert!((brier_score(&[(0.5, true), (0.5, false)]) - 0.25).abs() < 1e-12);
        assert_eq!(brier_score(&[]), 0.0);
    }

    #[test]
    fn empty_input_has_no_report() {
        assert!(CalibrationReport::compute(&[], 10).is_none());
    }

    #[test]
    fn pairs_prefer_signal_labels() {
        let signals = vec![
            Signal::new(0.8, 2).with_label(false),
            Signal::new(0.7, 2),
            Signal::new(0.6, 0),
        ];
        let labels = [OutcomeLabel::Win, OutcomeLabel::Win, OutcomeLabel::NoTrade];
        let pairs = prediction_pairs(&signals, Some(&labels));
        assert_eq!(pairs, vec![(0.8, false), (0.7, true)]);
        assert!(prediction_pairs(&signals[1..], None).is_empty());
    }
}
