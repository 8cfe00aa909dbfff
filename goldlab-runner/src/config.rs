//! Study configuration — one TOML file describing data, trading, sweep, and windows.
//!
//! ```toml
//! [data]
//! path = "predictions.csv"
//!
//! [trading]
//! profile = "break_even"
//! risk_amount = 150.0
//!
//! [sweep]
//! start = 0.50
//! end = 0.71
//! step = 0.01
//! objective = { kind = "max_sharpe", min_trades = 100 }
//!
//! [[windows]]
//! name = "2024-H1"
//! start = "2024-01-01T00:00:00"
//! end = "2024-06-30T23:59:59"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use goldlab_core::components::LevelConfig;
use goldlab_core::engine::{PnlMode, PositionLimit, Profile, RiskMode, TradingConfig};

use crate::optimizer::{Objective, SweepMode, ThresholdGrid};
use crate::walk_forward::WindowSpec;

/// Errors from loading or validating a study config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown trading profile '{0}' (expected legacy_atr, break_even, final_240, fixed_rr4)")]
    UnknownProfile(String),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

/// Top-level study configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StudyConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub trading: TradingSection,
    #[serde(default)]
    pub sweep: SweepSection,
    #[serde(default)]
    pub windows: Vec<WindowSpec>,
    #[serde(default)]
    pub window_options: WindowOptions,
}

/// `[data]`: where bars and signals come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default = "default_synthetic_bars")]
    pub synthetic_bars: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_synthetic_bars() -> usize {
    5_000
}

fn default_seed() -> u64 {
    42
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            synthetic: false,
            synthetic_bars: default_synthetic_bars(),
            seed: default_seed(),
        }
    }
}

/// `[trading]`: a named profile with optional per-field overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradingSection {
    #[serde(default)]
    pub profile: Option<String>,
    pub lookahead_horizon: Option<usize>,
    pub use_break_even: Option<bool>,
    pub risk_amount: Option<f64>,
    pub risk_mode: Option<RiskMode>,
    pub pnl_mode: Option<PnlMode>,
    pub target_reward_risk: Option<f64>,
    pub initial_capital: Option<f64>,
    pub min_score_magnitude: Option<i32>,
    pub position_limit: Option<PositionLimit>,
    pub levels: Option<LevelConfig>,
}

impl TradingSection {
    /// Resolve the profile and apply overrides.
    pub fn resolve(&self) -> Result<TradingConfig, ConfigError> {
        let mut cfg = match &self.profile {
            Some(name) => Profile::from_name(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.clone()))?
                .config(),
            None => TradingConfig::default(),
        };
        if let Some(v) = self.lookahead_horizon {
            cfg.lookahead_horizon = v;
        }
        if let Some(v) = self.use_break_even {
            cfg.use_break_even = v;
        }
        if let Some(v) = self.risk_amount {
            cfg.risk_amount = v;
        }
        if let Some(v) = self.risk_mode {
            cfg.risk_mode = v;
        }
        if let Some(v) = self.pnl_mode {
            cfg.pnl_mode = v;
        }
        if let Some(v) = self.target_reward_risk {
            cfg.target_reward_risk = v;
        }
        if let Some(v) = self.initial_capital {
            cfg.initial_capital = v;
        }
        if let Some(v) = self.min_score_magnitude {
            cfg.min_score_magnitude = v;
        }
        if let Some(v) = self.position_limit {
            cfg.position_limit = v;
        }
        if let Some(v) = self.levels {
            cfg.levels = v;
        }
        cfg.validate().map_err(|e| ConfigError::Invalid {
            field: "trading".into(),
            reason: e.to_string(),
        })?;
        Ok(cfg)
    }
}

/// `[sweep]`: candidate thresholds, evaluation mode, and selection objective.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepSection {
    #[serde(default = "default_start")]
    pub start: f64,
    #[serde(default = "default_end")]
    pub end: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default)]
    pub mode: SweepMode,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_start() -> f64 {
    0.50
}

fn default_end() -> f64 {
    0.95
}

fn default_step() -> f64 {
    0.01
}

fn default_parallel() -> bool {
    true
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            step: default_step(),
            mode: SweepMode::default(),
            objective: Objective::default(),
            parallel: default_parallel(),
        }
    }
}

impl SweepSection {
    pub fn grid(&self) -> Result<ThresholdGrid, ConfigError> {
        ThresholdGrid::range(self.start, self.end, self.step).map_err(|e| ConfigError::Invalid {
            field: "sweep".into(),
            reason: e.to_string(),
        })
    }
}

/// `[window_options]`: evaluation settings shared by all `[[windows]]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowOptions {
    /// Fixed threshold applied in every window.
    #[serde(default = "default_window_threshold")]
    pub threshold: f64,
    /// Windows with fewer bars are skipped.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,
}

fn default_window_threshold() -> f64 {
    0.60
}

fn default_min_bars() -> usize {
    100
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            threshold: default_window_threshold(),
            min_bars: default_min_bars(),
        }
    }
}

impl StudyConfig {
    /// Parse and validate a study config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trading.resolve()?;
        self.sweep.grid()?;
        self.sweep
            .objective
            .validate()
            .map_err(|e| ConfigError::Invalid {
                field: "sweep.objective".into(),
                reason: e.to_string(),
            })?;
        for (i, w) in self.windows.iter().enumerate() {
            if w.start > w.end {
                return Err(ConfigError::Invalid {
                    field: format!("windows[{i}]"),
                    reason: format!("'{}' starts after it ends", w.name),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.window_options.threshold) {
            return Err(ConfigError::Invalid {
                field: "window_options.threshold".into(),
                reason: format!("{} outside [0, 1]", self.window_options.threshold),
            });
        }
        Ok(())
    }

    pub fn trading_config(&self) -> Result<TradingConfig, ConfigError> {
        self.trading.resolve()
    }
}
