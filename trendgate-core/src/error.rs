//! Engine error taxonomy.
//!
//! Every variant is recoverable at bar granularity: the offending input or
//! decision is dropped and the pipeline continues. Configuration problems are
//! reported separately through [`crate::config::ConfigError`] and are fatal.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Timeframe;
use crate::indicators::IndicatorKey;
use crate::risk::Denial;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(
        "out-of-order data on {stream}: {timestamp} is not after last admitted {last_admitted}"
    )]
    OutOfOrderData {
        stream: String,
        timestamp: DateTime<Utc>,
        last_admitted: DateTime<Utc>,
    },

    #[error("invalid market data at {timestamp}: {reason}")]
    InvalidMarketData {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("{indicator} on {timeframe} is still warming up")]
    InsufficientHistory {
        timeframe: Timeframe,
        indicator: IndicatorKey,
    },

    #[error("both long and short predicate sets qualified at {timestamp}")]
    AmbiguousSignal { timestamp: DateTime<Utc> },

    #[error("entry denied at {timestamp}: {denial}")]
    AuthorizationDenied {
        timestamp: DateTime<Utc>,
        denial: Denial,
    },
}

impl EngineError {
    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::OutOfOrderData { .. } => "out_of_order_data",
            EngineError::InvalidMarketData { .. } => "invalid_market_data",
            EngineError::InsufficientHistory { .. } => "insufficient_history",
            EngineError::AmbiguousSignal { .. } => "ambiguous_signal",
            EngineError::AuthorizationDenied { .. } => "authorization_denied",
        }
    }

    /// True for errors caused by the data feed rather than by a decision.
    pub fn is_input_fault(&self) -> bool {
        matches!(
            self,
            EngineError::OutOfOrderData { .. } | EngineError::InvalidMarketData { .. }
        )
    }
}
