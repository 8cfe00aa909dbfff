//! Pluggable trade components: break-even policy and stop/target sizing.

pub mod breakeven;
pub mod levels;

pub use breakeven::{policy_for, BreakEven, BreakEvenPolicy, NoBreakEven, StopState};
pub use levels::{LevelConfig, LevelModel, Levels};
