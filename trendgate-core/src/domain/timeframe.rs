//! Timeframe: fixed bar intervals and their epoch-aligned boundaries.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar interval. Ordering follows interval length, shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    /// The four timeframes the engine aggregates by default.
    pub const STANDARD: [Timeframe; 4] = [Self::M5, Self::M15, Self::H1, Self::H4];

    pub fn seconds(self) -> i64 {
        match self {
            Self::M1 => 60,
            Self::M5 => 5 * 60,
            Self::M15 => 15 * 60,
            Self::H1 => 60 * 60,
            Self::H4 => 4 * 60 * 60,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// Open time of the bucket containing `ts`, aligned on the Unix epoch.
    pub fn bucket_start(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let aligned = secs - secs.rem_euclid(self.seconds());
        Utc.timestamp_opt(aligned, 0).single().unwrap_or(ts)
    }

    /// Close instant of the bucket containing `ts`.
    pub fn bucket_end(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.bucket_start(ts) + self.duration()
    }

    /// True when `self` bars can be rolled up into `other` bars.
    pub fn divides(self, other: Timeframe) -> bool {
        other.seconds() % self.seconds() == 0
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::M1),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "1h" | "60m" => Ok(Self::H1),
            "4h" | "240m" => Ok(Self::H4),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}
