//! Per-trade P&L and the running capital/drawdown path.

use serde::{Deserialize, Serialize};

use super::config::PnlMode;
use super::resolver::{EntryEvent, Resolution};

/// Currency P&L of one resolved trade.
///
/// The entry's risk distance must be positive; the resolver guarantees it for
/// every trade that reaches accounting.
pub fn trade_pnl(
    mode: PnlMode,
    risk: f64,
    reward_risk: f64,
    entry: &EntryEvent,
    resolution: &Resolution,
) -> f64 {
    match mode {
        PnlMode::FixedRewardRisk => {
            if resolution.outcome.is_win() {
                risk * reward_risk
            } else {
                -risk
            }
        }
        PnlMode::PriceProportional => {
            let move_pct = entry
                .direction
                .pct_move(entry.entry_price, resolution.exit_price);
            let risk_pct = entry.risk_distance() / entry.entry_price * 100.0;
            risk * move_pct / risk_pct
        }
    }
}

/// Capital path with peak tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalTracker {
    pub initial: f64,
    pub capital: f64,
    pub peak: f64,
    /// Most negative `capital − peak` seen (≤ 0).
    pub max_drawdown: f64,
}

impl CapitalTracker {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            capital: initial,
            peak: initial,
            max_drawdown: 0.0,
        }
    }

    /// Apply a trade's P&L and return capital after it.
    pub fn apply(&mut self, pnl: f64) -> f64 {
        self.capital += pnl;
        if self.capital > self.peak {
            self.peak = self.capital;
        }
        let dd = self.capital - self.peak;
        if dd < self.max_drawdown {
            self.max_drawdown = dd;
        }
        self.capital
    }

    /// Maximum drawdown as a percentage of initial capital (≤ 0).
    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown / self.initial * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, ExitReason, Outcome};

    fn entry(direction: Direction) -> EntryEvent {
        let sign = direction.sign();
        EntryEvent {
            bar_index: 0,
            direction,
            entry_price: 2000.0,
            stop_price: 2000.0 - sign * 15.0,
            target_price: 2000.0 + sign * 60.0,
        }
    }

    fn resolved(outcome: Outcome, exit_price: f64) -> Resolution {
        Resolution {
            outcome,
            exit_reason: ExitReason::Timeout,
            exit_bar: 3,
            exit_price,
            bars_held: 3,
            break_even_activated: false,
        }
    }

    #[test]
    fn proportional_target_hit_is_four_r() {
        // 1.5 ATR stop, 6 ATR target: +60 move on 15 risk distance
        let pnl = trade_pnl(
            PnlMode::PriceProportional,
            100.0,
            4.0,
            &entry(Direction::Long),
            &resolved(Outcome::Win, 2060.0),
        );
        assert!((pnl - 400.0).abs() < 1e-9);
    }

    #[test]
    fn proportional_break_even_books_zero() {
        let pnl = trade_pnl(
            PnlMode::PriceProportional,
            100.0,
            4.0,
            &entry(Direction::Short),
            &resolved(Outcome::Win, 2000.0),
        );
        assert_eq!(pnl, 0.0);
    }

    #[test]
    fn proportional_stop_is_minus_one_r() {
        let pnl = trade_pnl(
            PnlMode::PriceProportional,
            100.0,
            4.0,
            &entry(Direction::Short),
            &resolved(Outcome::Loss, 2015.0),
        );
        assert!((pnl + 100.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_rr_pays_by_class() {
        let e = entry(Direction::Long);
        let win = trade_pnl(
            PnlMode::FixedRewardRisk,
            100.0,
            4.0,
            &e,
            &resolved(Outcome::TimeoutWin, 2001.0),
        );
        let loss = trade_pnl(
            PnlMode::FixedRewardRisk,
            100.0,
            4.0,
            &e,
            &resolved(Outcome::TimeoutLoss, 2000.0),
        );
        assert_eq!(win, 400.0);
        assert_eq!(loss, -100.0);
    }

    #[test]
    fn drawdown_tracks_peak() {
        let mut t = CapitalTracker::new(10_000.0);
        t.apply(400.0);
        t.apply(-100.0);
        t.apply(-100.0);
        t.apply(400.0);
        assert_eq!(t.peak, 10_600.0);
        assert_eq!(t.max_drawdown, -200.0);
        assert!((t.max_drawdown_pct() + 2.0).abs() < 1e-12);
    }
}
