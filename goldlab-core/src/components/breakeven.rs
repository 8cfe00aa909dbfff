//! Break-even management — one-shot stop relocation to the entry price.
//!
//! Once price has moved one risk unit in the trade's favor, the stop moves to
//! entry. Relocation happens at most once per trade: after activation every
//! call is a no-op. The policy is pluggable so the break-even-off profile uses
//! [`NoBreakEven`] instead of a flag inside the resolver loop.

use crate::domain::{Bar, Direction};

/// Mutable stop fields of an open trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopState {
    pub current_stop: f64,
    pub activated: bool,
}

impl StopState {
    pub fn new(initial_stop: f64) -> Self {
        Self {
            current_stop: initial_stop,
            activated: false,
        }
    }
}

/// Stop relocation policy applied to each forward bar before the stop/target checks.
pub trait BreakEvenPolicy: Send + Sync {
    /// Human-readable name ("none", "break_even").
    fn name(&self) -> &str;

    /// Return the trade's stop state after observing `bar`.
    fn maybe_activate(
        &self,
        bar: &Bar,
        direction: Direction,
        entry: f64,
        risk: f64,
        state: StopState,
    ) -> StopState;
}

/// Break-even disabled: the stop never moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBreakEven;

impl BreakEvenPolicy for NoBreakEven {
    fn name(&self) -> &str {
        "none"
    }

    fn maybe_activate(
        &self,
        _bar: &Bar,
        _direction: Direction,
        _entry: f64,
        _risk: f64,
        state: StopState,
    ) -> StopState {
        state
    }
}

/// Move the stop to entry once the bar touches entry ± 1R.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakEven;

impl BreakEven {
    /// Price that must be touched to activate break-even.
    pub fn trigger_level(direction: Direction, entry: f64, risk: f64) -> f64 {
        entry + direction.sign() * risk
    }
}

impl BreakEvenPolicy for BreakEven {
    fn name(&self) -> &str {
        "break_even"
    }

    fn maybe_activate(
        &self,
        bar: &Bar,
        direction: Direction,
        entry: f64,
        risk: f64,
        state: StopState,
    ) -> StopState {
        if state.activated {
            return state;
        }
        let trigger = Self::trigger_level(direction, entry, risk);
        let touched = match direction {
            Direction::Long => bar.high >= trigger,
            Direction::Short => bar.low <= trigger,
        };
        if touched {
            StopState {
                current_stop: entry,
                activated: true,
            }
        } else {
            state
        }
    }
}

/// Pick the policy for a `use_break_even` toggle.
pub fn policy_for(use_break_even: bool) -> &'static dyn BreakEvenPolicy {
    if use_break_even {
        &BreakEven
    } else {
        &NoBreakEven
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(high: f64, low: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1.0,
            atr: 10.0,
            indicators: Vec::new(),
        }
    }

    #[test]
    fn long_below_trigger_holds() {
        let state = BreakEven.maybe_activate(
            &make_bar(2014.9, 1995.0),
            Direction::Long,
            2000.0,
            15.0,
            StopState::new(1985.0),
        );
        assert_eq!(state, StopState::new(1985.0));
    }

    #[test]
    fn long_touching_trigger_moves_stop_to_entry() {
        let state = BreakEven.maybe_activate(
            &make_bar(2015.0, 1995.0),
            Direction::Long,
            2000.0,
            15.0,
            StopState::new(1985.0),
        );
        assert!(state.activated);
        assert_eq!(state.current_stop, 2000.0);
    }

    #[test]
    fn short_touching_trigger_moves_stop_to_entry() {
        let state = BreakEven.maybe_activate(
            &make_bar(2005.0, 1985.0),
            Direction::Short,
            2000.0,
            15.0,
            StopState::new(2015.0),
        );
        assert!(state.activated);
        assert_eq!(state.current_stop, 2000.0);
    }

    #[test]
    fn activation_is_idempotent() {
        let activated = StopState {
            current_stop: 2000.0,
            activated: true,
        };
        let again = BreakEven.maybe_activate(
            &make_bar(2100.0, 1900.0),
            Direction::Long,
            2000.0,
            15.0,
            activated,
        );
        assert_eq!(again, activated);
    }

    #[test]
    fn no_break_even_never_moves() {
        let state = NoBreakEven.maybe_activate(
            &make_bar(2500.0, 1990.0),
            Direction::Long,
            2000.0,
            15.0,
            StopState::new(1985.0),
        );
        assert!(!state.activated);
        assert_eq!(state.current_stop, 1985.0);
    }

    #[test]
    fn policy_for_toggle() {
        assert_eq!(policy_for(true).name(), "break_even");
        assert_eq!(policy_for(false).name(), "none");
    }
}
