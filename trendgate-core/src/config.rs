//! Engine configuration.
//!
//! Loaded from TOML (or built in code via `Default`), then validated once in
//! [`EngineConfig::validate`]. A config that fails validation never reaches the
//! bar loop: [`crate::engine::Engine::new`] refuses to construct.
//!
//! ```toml
//! instrument = "GC"
//!
//! [session]
//! session_start = "08:30"
//! session_end = "16:00"
//! zone = "America/New_York"
//!
//! [risk]
//! max_loss_pct = 0.15
//! reward_multiple = 3.0
//! ```

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::Timeframe;
use crate::session::SessionWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid time '{value}' for {field} (expected HH:MM)")]
    InvalidTime { field: &'static str, value: String },

    #[error("unknown time zone '{0}'")]
    UnknownZone(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Instrument symbol, informational only.
    #[serde(default = "default_instrument")]
    pub instrument: String,

    pub session: SessionConfig,

    pub risk: RiskConfig,

    #[serde(default)]
    pub indicators: IndicatorConfig,

    #[serde(default)]
    pub timeframes: TimeframeConfig,
}

fn default_instrument() -> String {
    "GC".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            session: SessionConfig::default(),
            risk: RiskConfig::default(),
            indicators: IndicatorConfig::default(),
            timeframes: TimeframeConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check every parameter. Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.window()?;
        self.risk.validate()?;
        self.indicators.validate()?;
        self.timeframes.validate()?;
        Ok(())
    }
}

/// Trading session window in the exchange time zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub session_start: String,
    pub session_end: String,
    pub zone: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_start: "08:30".into(),
            session_end: "16:00".into(),
            zone: "America/New_York".into(),
        }
    }
}

fn parse_hhmm(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidTime {
            field,
            value: value.to_string(),
        })
}

impl SessionConfig {
    /// Parse into a resolved window.
    pub fn window(&self) -> Result<SessionWindow, ConfigError> {
        let start = parse_hhmm("session_start", &self.session_start)?;
        let end = parse_hhmm("session_end", &self.session_end)?;
        let zone: Tz = self
            .zone
            .parse()
            .map_err(|_| ConfigError::UnknownZone(self.zone.clone()))?;
        if start >= end {
            return Err(invalid(
                "session_end",
                format!("{end} must be after session_start {start}"),
            ));
        }
        Ok(SessionWindow { start, end, zone })
    }
}

/// Risk and filter parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    /// Stop distance as a fraction of entry price.
    #[serde(default = "default_max_loss_pct")]
    pub max_loss_pct: f64,

    /// Target distance as a multiple of stop distance.
    #[serde(default = "default_reward_multiple")]
    pub reward_multiple: f64,

    #[serde(default = "default_contracts")]
    pub contracts_per_trade: u32,

    /// Minimum HTF ADX for any entry.
    #[serde(default = "default_adx_floor")]
    pub adx_floor: f64,

    /// Relative band around HTF EMA200 treated as chop.
    #[serde(default = "default_chop_band_pct")]
    pub chop_band_pct: f64,

    /// Volume SMA window on the LTF.
    #[serde(default = "default_volume_lookback")]
    pub volume_lookback: usize,

    /// Bar volume must exceed `volume_multiplier × VolumeSMA`.
    #[serde(default = "default_volume_multiplier")]
    pub volume_multiplier: f64,

    /// Stop taking entries once the day's realized loss reaches this fraction
    /// of account equity. Disabled when absent.
    #[serde(default)]
    pub daily_loss_limit_pct: Option<f64>,

    /// Currency value of one price point per contract.
    #[serde(default = "default_point_value")]
    pub point_value: f64,
}

fn default_max_loss_pct() -> f64 {
    0.15
}
fn default_reward_multiple() -> f64 {
    3.0
}
fn default_contracts() -> u32 {
    1
}
fn default_adx_floor() -> f64 {
    20.0
}
fn default_chop_band_pct() -> f64 {
    0.005
}
fn default_volume_lookback() -> usize {
    20
}
fn default_volume_multiplier() -> f64 {
    1.0
}
fn default_point_value() -> f64 {
    10.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_loss_pct: default_max_loss_pct(),
            reward_multiple: default_reward_multiple(),
            contracts_per_trade: default_contracts(),
            adx_floor: default_adx_floor(),
            chop_band_pct: default_chop_band_pct(),
            volume_lookback: default_volume_lookback(),
            volume_multiplier: default_volume_multiplier(),
            daily_loss_limit_pct: None,
            point_value: default_point_value(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_loss_pct > 0.0 && self.max_loss_pct < 1.0) {
            return Err(invalid("max_loss_pct", "must be in (0, 1)"));
        }
        if !(self.reward_multiple.is_finite() && self.reward_multiple > 0.0) {
            return Err(invalid("reward_multiple", "must be > 0"));
        }
        if self.contracts_per_trade == 0 {
            return Err(invalid("contracts_per_trade", "must be >= 1"));
        }
        if !(self.adx_floor.is_finite() && self.adx_floor >= 0.0) {
            return Err(invalid("adx_floor", "must be >= 0"));
        }
        if !(self.chop_band_pct.is_finite() && self.chop_band_pct >= 0.0) {
            return Err(invalid("chop_band_pct", "must be >= 0"));
        }
        if self.volume_lookback == 0 {
            return Err(invalid("volume_lookback", "must be >= 1"));
        }
        if !(self.volume_multiplier.is_finite() && self.volume_multiplier >= 0.0) {
            return Err(invalid("volume_multiplier", "must be >= 0"));
        }
        if !(self.point_value.is_finite() && self.point_value > 0.0) {
            return Err(invalid("point_value", "must be > 0"));
        }
        if let Some(limit) = self.daily_loss_limit_pct {
            if !(limit > 0.0 && limit.is_finite()) {
                return Err(invalid("daily_loss_limit_pct", "must be > 0"));
            }
        }
        Ok(())
    }
}

/// Indicator periods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub ema_trend: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub adx_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_mid: 21,
            ema_slow: 60,
            ema_trend: 200,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            adx_period: 14,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("ema_fast", self.ema_fast),
            ("ema_mid", self.ema_mid),
            ("ema_slow", self.ema_slow),
            ("ema_trend", self.ema_trend),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("adx_period", self.adx_period),
        ];
        for (field, period) in periods {
            if period == 0 {
                return Err(invalid(field, "period must be >= 1"));
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(invalid("macd_fast", "must be shorter than macd_slow"));
        }
        Ok(())
    }
}

/// Which timeframes are built and which two drive decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeframeConfig {
    pub ltf: Timeframe,
    pub htf: Timeframe,
    pub aggregate: Vec<Timeframe>,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            ltf: Timeframe::M5,
            htf: Timeframe::H1,
            aggregate: Timeframe::STANDARD.to_vec(),
        }
    }
}

impl TimeframeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ltf >= self.htf {
            return Err(invalid("ltf", format!("{} must be shorter than htf {}", self.ltf, self.htf)));
        }
        for (field, tf) in [("ltf", self.ltf), ("htf", self.htf)] {
            if !self.aggregate.contains(&tf) {
                return Err(invalid(field, format!("{tf} is not in aggregate")));
            }
        }
        Ok(())
    }

    /// Aggregated timeframes, sorted and deduplicated.
    pub fn targets(&self) -> Vec<Timeframe> {
        let mut tfs = self.aggregate.clone();
        tfs.sort();
        tfs.dedup();
        tfs
    }
}
