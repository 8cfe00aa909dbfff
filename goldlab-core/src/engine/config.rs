//! Trading configuration and the named profiles of historical backtest variants.

use serde::{Deserialize, Serialize};

use crate::components::{policy_for, BreakEvenPolicy, LevelConfig, LevelModel};
use crate::domain::DEFAULT_MIN_SCORE_MAGNITUDE;

use super::EngineError;

/// How much currency each trade risks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    /// `risk_amount` is a fixed currency amount per trade.
    FixedCurrency,
    /// `risk_amount` is a percentage of capital before the trade.
    PercentOfCapital,
}

/// How a resolved trade is converted into currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlMode {
    /// Scale the realised price move by the stop distance.
    PriceProportional,
    /// Win-class pays `risk × target_reward_risk`, loss-class pays `−risk`.
    FixedRewardRisk,
}

/// Concurrent-position policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionLimit {
    /// Every qualifying bar opens a trade, even while earlier trades are open.
    #[default]
    Unlimited,
    /// A new trade may open only at or after the previous trade's exit bar.
    Single,
}

/// Named historical configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    LegacyAtr,
    BreakEven,
    Final240,
    FixedRr4,
}

impl Profile {
    pub const ALL: [Profile; 4] = [
        Profile::LegacyAtr,
        Profile::BreakEven,
        Profile::Final240,
        Profile::FixedRr4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LegacyAtr => "legacy_atr",
            Self::BreakEven => "break_even",
            Self::Final240 => "final_240",
            Self::FixedRr4 => "fixed_rr4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn config(self) -> TradingConfig {
        TradingConfig::profile(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Maximum number of forward bars examined per trade (H).
    pub lookahead_horizon: usize,
    pub use_break_even: bool,
    /// Currency amount or percentage, per `risk_mode`.
    pub risk_amount: f64,
    pub risk_mode: RiskMode,
    pub pnl_mode: PnlMode,
    /// Reward multiple paid per win under `PnlMode::FixedRewardRisk`.
    pub target_reward_risk: f64,
    pub initial_capital: f64,
    #[serde(default = "default_min_score_magnitude")]
    pub min_score_magnitude: i32,
    #[serde(default)]
    pub position_limit: PositionLimit,
    #[serde(default)]
    pub levels: LevelConfig,
}

fn default_min_score_magnitude() -> i32 {
    DEFAULT_MIN_SCORE_MAGNITUDE
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self::profile(Profile::LegacyAtr)
    }
}

impl TradingConfig {
    pub fn profile(profile: Profile) -> Self {
        let legacy = Self {
            lookahead_horizon: 180,
            use_break_even: false,
            risk_amount: 100.0,
            risk_mode: RiskMode::FixedCurrency,
            pnl_mode: PnlMode::PriceProportional,
            target_reward_risk: 4.0,
            initial_capital: 10_000.0,
            min_score_magnitude: DEFAULT_MIN_SCORE_MAGNITUDE,
            position_limit: PositionLimit::Unlimited,
            levels: LevelConfig::default(),
        };
        match profile {
            Profile::LegacyAtr => legacy,
            Profile::BreakEven => Self {
                use_break_even: true,
                ..legacy
            },
            Profile::Final240 => Self {
                lookahead_horizon: 240,
                ..legacy
            },
            Profile::FixedRr4 => Self {
                lookahead_horizon: 240,
                pnl_mode: PnlMode::FixedRewardRisk,
                target_reward_risk: 4.0,
                levels: LevelConfig {
                    model: LevelModel::Atr {
                        sl_multiplier: 1.5,
                        tp_multiplier: 6.0,
                    },
                    min_reward_risk: Some(4.0),
                },
                ..legacy
            },
        }
    }

    pub fn break_even_policy(&self) -> &'static dyn BreakEvenPolicy {
        policy_for(self.use_break_even)
    }

    /// Currency risked on the next trade given current capital.
    pub fn risk_for(&self, capital: f64) -> f64 {
        match self.risk_mode {
            RiskMode::FixedCurrency => self.risk_amount,
            RiskMode::PercentOfCapital => capital.max(0.0) * self.risk_amount / 100.0,
        }
    }

    /// Win rate needed to break even at `target_reward_risk`.
    pub fn breakeven_win_rate(&self) -> f64 {
        1.0 / (1.0 + self.target_reward_risk)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        fn invalid(field: &'static str, reason: String) -> Result<(), EngineError> {
            Err(EngineError::InvalidConfig { field, reason })
        }
        fn positive(x: f64) -> bool {
            x > 0.0 && x.is_finite()
        }

        if self.lookahead_horizon == 0 {
            return invalid("lookahead_horizon", "must be at least 1".into());
        }
        if !positive(self.risk_amount) {
            return invalid(
                "risk_amount",
                format!("must be positive and finite, got {}", self.risk_amount),
            );
        }
        if self.risk_mode == RiskMode::PercentOfCapital && self.risk_amount > 100.0 {
            return invalid(
                "risk_amount",
                format!("percentage above 100: {}", self.risk_amount),
            );
        }
        if !positive(self.initial_capital) {
            return invalid(
                "initial_capital",
                format!("must be positive and finite, got {}", self.initial_capital),
            );
        }
        if self.pnl_mode == PnlMode::FixedRewardRisk && !positive(self.target_reward_risk) {
            return invalid(
                "target_reward_risk",
                format!("must be positive, got {}", self.target_reward_risk),
            );
        }
        if self.min_score_magnitude < 1 {
            return invalid(
                "min_score_magnitude",
                format!("must be at least 1, got {}", self.min_score_magnitude),
            );
        }
        let (sl, tp) = match self.levels.model {
            LevelModel::Atr {
                sl_multiplier,
                tp_multiplier,
            } => (sl_multiplier, tp_multiplier),
            LevelModel::Percent { sl_pct, tp_pct } => (sl_pct, tp_pct),
        };
        if !positive(sl) || !positive(tp) {
            return invalid(
                "levels",
                format!("stop and target distances must be positive, got {sl} / {tp}"),
            );
        }
        if let Some(min_rr) = self.levels.min_reward_risk {
            if !positive(min_rr) {
                return invalid(
                    "levels.min_reward_risk",
                    format!("must be positive, got {min_rr}"),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_validate() {
        for p in Profile::ALL {
            assert!(p.config().validate().is_ok(), "{}", p.name());
            assert_eq!(Profile::from_name(p.name()), Some(p));
        }
    }

    #[test]
    fn break_even_profile_differs_only_in_toggle() {
        let legacy = Profile::LegacyAtr.config();
        let be = Profile::BreakEven.config();
        assert!(be.use_break_even);
        assert_eq!(
            TradingConfig {
                use_break_even: false,
                ..be
            },
            legacy
        );
    }

    #[test]
    fn fixed_rr4_risks_fixed_currency() {
        let cfg = Profile::FixedRr4.config();
        assert_eq!(cfg.risk_mode, RiskMode::FixedCurrency);
        assert_eq!(cfg.risk_for(10_000.0), 100.0);
        assert_eq!(cfg.risk_for(12_000.0), 100.0);
    }

    #[test]
    fn percent_risk_uses_capital() {
        let cfg = TradingConfig {
            risk_amount: 1.0,
            risk_mode: RiskMode::PercentOfCapital,
            ..Profile::FixedRr4.config()
        };
        assert!((cfg.risk_for(10_000.0) - 100.0).abs() < 1e-12);
        assert!((cfg.risk_for(12_000.0) - 120.0).abs() < 1e-12);
        assert_eq!(cfg.risk_for(-5.0), 0.0);
    }

    #[test]
    fn breakeven_win_rate_for_rr4() {
        assert!((Profile::FixedRr4.config().breakeven_win_rate() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn zero_horizon_rejected() {
        let cfg = TradingConfig {
            lookahead_horizon: 0,
            ..TradingConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidConfig {
                field: "lookahead_horizon",
                ..
            })
        ));
    }

    #[test]
    fn nan_risk_rejected() {
        let cfg = TradingConfig {
            risk_amount: f64::NAN,
            ..TradingConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn serde_defaults_fill_optional_fields() {
        let json = r#"{
            "lookahead_horizon": 180,
            "use_break_even": true,
            "risk_amount": 100.0,
            "risk_mode": "fixed_currency",
            "pnl_mode": "price_proportional",
            "target_reward_risk": 4.0,
            "initial_capital": 10000.0
        }"#;
        let cfg: TradingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.min_score_magnitude, 2);
        assert_eq!(cfg.position_limit, PositionLimit::Unlimited);
        assert_eq!(cfg.levels, LevelConfig::default());
    }
}
