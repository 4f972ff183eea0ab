//! Run configuration: the engine config plus feed, news, account and output.
//!
//! ```toml
//! [engine]
//! instrument = "GC"
//!
//! [engine.session]
//! session_start = "08:30"
//! session_end = "16:00"
//! zone = "America/New_York"
//!
//! [engine.risk]
//! max_loss_pct = 0.15
//!
//! [feed]
//! path = "data/gc_ticks.csv"
//! kind = "ticks"
//!
//! [[news.windows]]
//! start = "2024-03-08T13:25:00Z"
//! end = "2024-03-08T13:45:00Z"
//! label = "NFP"
//!
//! [output]
//! intents = "out/intents.jsonl"
//! trades = "out/trades.csv"
//! ```

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use trendgate_core::config::ConfigError;
use trendgate_core::domain::Timeframe;
use trendgate_core::news::{BlackoutWindow, NewsCalendar};
use trendgate_core::EngineConfig;

use crate::error::RunnerError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub engine: EngineConfig,

    pub feed: FeedConfig,

    #[serde(default)]
    pub news: NewsConfig,

    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// `timestamp,price,volume`
    Ticks,
    /// `timestamp,open,high,low,close,volume`, stamped at bar open.
    Bars,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub path: PathBuf,

    pub kind: FeedKind,

    /// Source bar timeframe for `kind = "bars"`.
    #[serde(default = "default_source_timeframe")]
    pub timeframe: Timeframe,

    /// Zone for timestamps without an offset. Defaults to the session zone.
    #[serde(default)]
    pub zone: Option<String>,
}

fn default_source_timeframe() -> Timeframe {
    Timeframe::M5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsConfig {
    /// Blackout for the whole run.
    #[serde(default)]
    pub manual: bool,

    #[serde(default)]
    pub windows: Vec<BlackoutWindow>,
}

impl NewsConfig {
    pub fn calendar(&self) -> NewsCalendar {
        let mut calendar = NewsCalendar::new(self.windows.clone());
        calendar.set_manual(self.manual);
        calendar
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountConfig {
    /// Equity the daily loss limit is measured against.
    #[serde(default = "default_equity")]
    pub equity: f64,
}

fn default_equity() -> f64 {
    100_000.0
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            equity: default_equity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// JSON Lines file receiving every order intent.
    #[serde(default)]
    pub intents: Option<PathBuf>,
    /// CSV trade tape of closed round trips.
    #[serde(default)]
    pub trades: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, RunnerError> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk. Relative feed and output paths resolve against the
    /// config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, RunnerError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.feed.path = resolve(base, &config.feed.path);
            config.output.intents = config.output.intents.map(|p| resolve(base, &p));
            config.output.trades = config.output.trades.map(|p| resolve(base, &p));
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        self.engine.validate()?;
        self.feed_zone()?;
        if self.feed.kind == FeedKind::Bars {
            let source = self.feed.timeframe;
            if let Some(tf) = self
                .engine
                .timeframes
                .targets()
                .into_iter()
                .find(|tf| !source.divides(*tf))
            {
                return Err(RunnerError::Feed(format!(
                    "{source} bars cannot build {tf} bars"
                )));
            }
        }
        if !(self.account.equity.is_finite() && self.account.equity > 0.0) {
            return Err(ConfigError::Invalid {
                field: "account.equity",
                reason: "must be > 0".into(),
            }
            .into());
        }
        for w in &self.news.windows {
            if w.end <= w.start {
                return Err(ConfigError::Invalid {
                    field: "news.windows",
                    reason: format!("window '{}' ends before it starts", w.label),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Zone used for naive feed timestamps.
    pub fn feed_zone(&self) -> Result<Tz, RunnerError> {
        let name = self
            .feed
            .zone
            .as_deref()
            .unwrap_or(&self.engine.session.zone);
        name.parse::<Tz>()
            .map_err(|_| ConfigError::UnknownZone(name.to_string()).into())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}
