//! TrendGate Core: multi-timeframe signal and trade-lifecycle engine for a single futures instrument.
//!
//! This crate contains the decision engine:
//! - Domain types (bars, ticks, positions, intents, closed trades)
//! - Bar aggregation from ticks or finer pre-built bars
//! - Streaming indicators (EMA, MACD, session VWAP, ADX, volume SMA) per timeframe
//! - Signal evaluation as an ordered list of named predicates
//! - Position state machine with fixed bracket levels and a session-close deadline
//! - Risk guard that every entry passes through
//! - The `Engine` pipeline that wires them together

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod news;
pub mod position;
pub mod risk;
pub mod session;
pub mod signals;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineEvent};
pub use error::EngineError;
