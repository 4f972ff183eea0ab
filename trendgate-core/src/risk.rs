//! Risk guard: final yes/no on every entry before the position manager commits.
//!
//! Fails closed: anything it cannot verify is a denial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RiskConfig;
use crate::domain::{Bracket, Side};
use crate::indicators::{IndicatorKey, IndicatorSnapshot, HTF_REQUIRED, LTF_REQUIRED};

/// Relative slack when re-checking the stop distance against the cap.
const LOSS_CAP_TOLERANCE: f64 = 1e-9;

/// Why an entry was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Denial {
    #[error("contract count {requested} differs from allowed {allowed}")]
    ContractCount { requested: u32, allowed: u32 },

    #[error("a position is already open")]
    PositionOpen,

    #[error("stop distance {loss_pct:.4} exceeds cap {cap:.4}")]
    StopTooWide { loss_pct: f64, cap: f64 },

    #[error("stop or target on the wrong side of entry")]
    InvertedBracket,

    #[error("invalid price level: {0}")]
    InvalidLevel(String),

    #[error("snapshot value missing: {0}")]
    MissingSnapshotValue(IndicatorKey),

    #[error("outside trading session")]
    OutsideSession,

    #[error("daily loss {realized:.2} reached limit {limit:.2}")]
    DailyLossLimit { realized: f64, limit: f64 },

    #[error("daily loss limit configured but account equity unknown")]
    EquityUnknown,
}

/// Entry the position manager wants to open.
#[derive(Debug, Clone)]
pub struct EntryProposal<'a> {
    pub side: Side,
    pub entry_price: f64,
    pub bracket: Bracket,
    pub contract_count: u32,
    pub timestamp: DateTime<Utc>,
    /// LTF snapshot the decision was made on.
    pub ltf: &'a IndicatorSnapshot,
    /// HTF snapshot in force at the decision.
    pub htf: &'a IndicatorSnapshot,
}

/// Account facts supplied by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountState {
    pub position_open: bool,
    pub session_open: bool,
    pub equity: Option<f64>,
    /// Realized P&L since the session rollover, in currency.
    pub realized_pnl_today: f64,
}

#[derive(Debug, Clone)]
pub struct RiskGuard {
    config: RiskConfig,
}

impl RiskGuard {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn authorize(&self, proposal: &EntryProposal<'_>, account: &AccountState) -> bool {
        self.check(proposal, account).is_ok()
    }

    /// Run every rule in order; the first failure is returned.
    pub fn check(&self, proposal: &EntryProposal<'_>, account: &AccountState) -> Result<(), Denial> {
        if proposal.contract_count != self.config.contracts_per_trade {
            return Err(Denial::ContractCount {
                requested: proposal.contract_count,
                allowed: self.config.contracts_per_trade,
            });
        }
        if account.position_open {
            return Err(Denial::PositionOpen);
        }
        if !account.session_open {
            return Err(Denial::OutsideSession);
        }

        let entry = proposal.entry_price;
        let Bracket {
            stop_price,
            target_price,
        } = proposal.bracket;
        for (name, v) in [("entry", entry), ("stop", stop_price), ("target", target_price)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Denial::InvalidLevel(format!("{name}={v}")));
            }
        }
        let sign = proposal.side.sign();
        if sign * (entry - stop_price) <= 0.0 || sign * (target_price - entry) <= 0.0 {
            return Err(Denial::InvertedBracket);
        }
        let loss_pct = proposal.bracket.loss_fraction(entry);
        if loss_pct > self.config.max_loss_pct * (1.0 + LOSS_CAP_TOLERANCE) {
            return Err(Denial::StopTooWide {
                loss_pct,
                cap: self.config.max_loss_pct,
            });
        }

        let missing = proposal
            .ltf
            .first_missing(LTF_REQUIRED)
            .or_else(|| proposal.htf.first_missing(HTF_REQUIRED));
        if let Some(key) = missing {
            return Err(Denial::MissingSnapshotValue(key));
        }

        if let Some(pct) = self.config.daily_loss_limit_pct {
            let equity = account.equity.ok_or(Denial::EquityUnknown)?;
            let limit = pct * equity;
            if account.realized_pnl_today <= -limit {
                return Err(Denial::DailyLossLimit {
                    realized: account.realized_pnl_today,
                    limit,
                });
            }
        }
        Ok(())
    }
}
