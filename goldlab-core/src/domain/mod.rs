//! Domain types for goldlab

pub mod bar;
pub mod direction;
pub mod series;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use direction::{Direction, DEFAULT_MIN_SCORE_MAGNITUDE};
pub use series::{date_range, validate_bars, validate_signals, SeriesError};
pub use signal::{count_qualifying, Signal};
pub use trade::{ExitReason, Outcome, TradeRecord};
