//! Trade intents (evaluator output) and order intents (engine output).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::{ExitReason, Side};

/// Identifier of an entry predicate that fired.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonTag {
    ChopFilter,
    TrendStrength,
    NewsBlackout,
    HtfTrend,
    LtfAlignment,
    LtfConfirmation,
    VolumeConfirmation,
    Custom(String),
}

impl fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonTag::ChopFilter => f.write_str("chop_filter"),
            ReasonTag::TrendStrength => f.write_str("trend_strength"),
            ReasonTag::NewsBlackout => f.write_str("news_blackout"),
            ReasonTag::HtfTrend => f.write_str("htf_trend"),
            ReasonTag::LtfAlignment => f.write_str("ltf_alignment"),
            ReasonTag::LtfConfirmation => f.write_str("ltf_confirmation"),
            ReasonTag::VolumeConfirmation => f.write_str("volume_confirmation"),
            ReasonTag::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Directional entry request produced by the signal evaluator for one LTF bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub side: Side,
    pub reasons: BTreeSet<ReasonTag>,
    pub timestamp: DateTime<Utc>,
}

impl TradeIntent {
    pub fn new(side: Side, timestamp: DateTime<Utc>) -> Self {
        Self {
            side,
            reasons: BTreeSet::new(),
            timestamp,
        }
    }

    pub fn with_reasons(mut self, reasons: impl IntoIterator<Item = ReasonTag>) -> Self {
        self.reasons.extend(reasons);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Enter,
    Exit,
}

/// Instruction handed to the external execution collaborator.
///
/// `price` is the reference price: the entry close for entries, the stop or
/// target level or the bar close for exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub action: OrderAction,
    pub side: Side,
    pub contract_count: u32,
    pub price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub reasons: BTreeSet<ReasonTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
    pub timestamp: DateTime<Utc>,
}

impl OrderIntent {
    pub fn is_entry(&self) -> bool {
        self.action == OrderAction::Enter
    }

    pub fn is_exit(&self) -> bool {
        self.action == OrderAction::Exit
    }
}
