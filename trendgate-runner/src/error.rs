//! Runner error type.

use std::path::PathBuf;

use thiserror::Error;
use trendgate_core::{ConfigError, EngineError};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("run config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("row {row}: bad timestamp '{value}': {reason}")]
    Timestamp {
        row: usize,
        value: String,
        reason: String,
    },

    #[error("feed error: {0}")]
    Feed(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl RunnerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }
}
