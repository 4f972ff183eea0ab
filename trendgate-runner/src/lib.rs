//! TrendGate Runner: drives `trendgate-core` over recorded or synthetic data.
//!
//! This crate builds on `trendgate-core` to provide:
//! - Run configuration (engine, feed, news calendar, account, output)
//! - CSV feed loading with zone-aware timestamp parsing
//! - Deterministic historical replay with a fingerprinted report
//! - Order intent sinks (JSON Lines, in-memory)
//! - CSV trade tape export
//! - Trade summary statistics
//! - Seeded synthetic tick generation

pub mod config;
pub mod error;
pub mod export;
pub mod feed;
pub mod replay;
pub mod sink;
pub mod summary;
pub mod synthetic;

pub use config::{AccountConfig, FeedConfig, FeedKind, NewsConfig, OutputConfig, RunConfig};
pub use error::RunnerError;
pub use export::{write_trades, write_trades_file, TradeRow};
pub use feed::{load_feed, parse_timestamp, read_bars, read_ticks, write_ticks, write_ticks_file};
pub use replay::{replay, run, ReplayReport};
pub use sink::{read_jsonl, JsonlSink, MemorySink, NullSink, OrderSink};
pub use summary::TradeSummary;
pub use synthetic::{generate_ticks, SyntheticConfig};
