//! Property tests for resolver and aggregator invariants.
//!
//! Uses proptest to verify:
//! 1. Determinism — identical inputs produce identical runs
//! 2. Exactly one outcome — every trade resolves within the horizon window
//! 3. Threshold monotonicity — raising the threshold never adds qualifying signals
//! 4. Accounting identity — final capital equals initial plus summed P&L

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use goldlab_core::domain::{count_qualifying, Bar, ExitReason, Signal};
use goldlab_core::engine::{run_backtest, Profile, TradingConfig};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random-walk bars with positive prices and ATR.
fn arb_series(max_len: usize) -> impl Strategy<Value = (Vec<Bar>, Vec<Signal>)> {
    prop::collection::vec(
        (
            -15.0..15.0_f64,
            0.5..12.0_f64,
            0.5..12.0_f64,
            2.0..20.0_f64,
            0.0..1.0_f64,
            -4..=4_i32,
        ),
        2..max_len,
    )
    .prop_map(|steps| {
        let t0 = NaiveDate::from_ymd_opt(2022, 1, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut close = 1800.0;
        let mut bars = Vec::with_capacity(steps.len());
        let mut signals = Vec::with_capacity(steps.len());
        for (i, (delta, up, down, atr, prob, score)) in steps.into_iter().enumerate() {
            let open = close;
            close = (close + delta).max(100.0);
            bars.push(Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open,
                high: open.max(close) + up,
                low: open.min(close) - down,
                close,
                volume: 1.0,
                atr,
                indicators: Vec::new(),
            });
            signals.push(Signal::new(prob, score));
        }
        (bars, signals)
    })
}

fn arb_profile() -> impl Strategy<Value = TradingConfig> {
    prop::sample::select(Profile::ALL.to_vec()).prop_map(|p| TradingConfig {
        lookahead_horizon: 12,
        ..p.config()
    })
}

proptest! {
    #[test]
    fn runs_are_deterministic(
        (bars, signals) in arb_series(80),
        cfg in arb_profile(),
        threshold in 0.0..1.0_f64,
    ) {
        let a = run_backtest(&bars, &signals, threshold, &cfg).unwrap();
        let b = run_backtest(&bars, &signals, threshold, &cfg).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn every_trade_resolves_inside_its_window(
        (bars, signals) in arb_series(80),
        cfg in arb_profile(),
    ) {
        let run = run_backtest(&bars, &signals, 0.3, &cfg).unwrap();
        for t in &run.trades {
            prop_assert!(t.risk_distance > 0.0);
            prop_assert!(t.bars_held >= 1);
            prop_assert!(t.bars_held <= cfg.lookahead_horizon);
            prop_assert_eq!(t.exit_bar, t.entry_bar + t.bars_held);
            prop_assert_eq!(t.outcome.is_timeout(), t.exit_reason == ExitReason::Timeout);
            if t.exit_reason == ExitReason::BreakEven {
                prop_assert!(cfg.use_break_even);
                prop_assert!(t.outcome.is_win());
            }
        }
    }

    #[test]
    fn raising_threshold_never_adds_signals(
        (_bars, signals) in arb_series(60),
        lo in 0.0..1.0_f64,
        gap in 0.0..0.5_f64,
    ) {
        let hi = lo + gap;
        prop_assert!(count_qualifying(&signals, hi) <= count_qualifying(&signals, lo));
    }

    #[test]
    fn capital_equals_initial_plus_pnl(
        (bars, signals) in arb_series(80),
        cfg in arb_profile(),
    ) {
        let run = run_backtest(&bars, &signals, 0.2, &cfg).unwrap();
        let pnl: f64 = run.trades.iter().map(|t| t.pnl).sum();
        prop_assert!((run.final_capital - run.initial_capital - pnl).abs() < 1e-6);
        prop_assert!(run.max_drawdown <= 0.0);
        prop_assert_eq!(run.equity_curve.len(), run.trades.len());
        prop_assert_eq!(
            run.counts.qualifying,
            run.counts.no_direction
                + run.counts.skipped_invalid
                + run.counts.skipped_position_limit
                + run.counts.traded
        );
    }
}
