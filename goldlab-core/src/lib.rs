//! GoldLab Core — domain types, trade resolver, break-even policy, backtest aggregator.
//!
//! This crate contains the heart of the backtest engine:
//! - Domain types (bars, classifier signals, directions, trade records)
//! - Series validation and date slicing
//! - Stop/target level models and the break-even policy
//! - Per-trade forward resolution with a bounded lookahead horizon
//! - Threshold-filtered aggregator loop with capital and drawdown tracking
//! - BLAKE3 fingerprints of configurations and data sets

pub mod components;
pub mod domain;
pub mod engine;
pub mod fingerprint;
