//! Position, bracket levels and closed trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("long"),
            Side::Short => f.write_str("short"),
        }
    }
}

/// Stop and target computed once at entry.
///
/// Long: `stop = entry × (1 − max_loss_pct)`, `target = entry + reward × (entry − stop)`.
/// Short mirrors both around the entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub stop_price: f64,
    pub target_price: f64,
}

impl Bracket {
    pub fn compute(side: Side, entry_price: f64, max_loss_pct: f64, reward_multiple: f64) -> Self {
        let risk = entry_price * max_loss_pct;
        let stop_price = entry_price - side.sign() * risk;
        let target_price = entry_price + side.sign() * reward_multiple * risk;
        Self {
            stop_price,
            target_price,
        }
    }

    /// Fractional loss at the stop, relative to entry.
    pub fn loss_fraction(&self, entry_price: f64) -> f64 {
        (entry_price - self.stop_price).abs() / entry_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closing,
}

/// The single open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub contract_count: u32,
    pub entry_time: DateTime<Utc>,
    pub status: PositionStatus,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    pub fn bracket(&self) -> Bracket {
        Bracket {
            stop_price: self.stop_price,
            target_price: self.target_price,
        }
    }

    /// True if the bar range reached the stop.
    pub fn stop_touched(&self, high: f64, low: f64) -> bool {
        match self.side {
            Side::Long => low <= self.stop_price,
            Side::Short => high >= self.stop_price,
        }
    }

    /// True if the bar range reached the target.
    pub fn target_touched(&self, high: f64, low: f64) -> bool {
        match self.side {
            Side::Long => high >= self.target_price,
            Side::Short => low <= self.target_price,
        }
    }

    pub fn unrealized_points(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * f64::from(self.contract_count)
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Target,
    MacdFlip,
    Ema9Break,
    SessionClose,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Stop => "stop",
            ExitReason::Target => "target",
            ExitReason::MacdFlip => "macd_flip",
            ExitReason::Ema9Break => "ema9_break",
            ExitReason::SessionClose => "session_close",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

/// Completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub contract_count: u32,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// Realized P&L in price points across all contracts.
    pub fn pnl_points(&self) -> f64 {
        self.side.sign() * (self.exit_price - self.entry_price) * f64::from(self.contract_count)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl_points() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn long_bracket_matches_reference_levels() {
        let b = Bracket::compute(Side::Long, 2042.0, 0.15, 3.0);
        assert!(approx(b.stop_price, 1735.7));
        assert!(approx(b.target_price, 2960.9));
        assert!(approx(b.loss_fraction(2042.0), 0.15));
    }

    #[test]
    fn short_bracket_is_mirrored() {
        let b = Bracket::compute(Side::Short, 2000.0, 0.15, 3.0);
        assert!(approx(b.stop_price, 2300.0));
        assert!(approx(b.target_price, 1100.0));
        assert!(approx(2000.0 - b.target_price, 3.0 * (b.stop_price - 2000.0)));
    }

    fn position(side: Side) -> Position {
        let b = Bracket::compute(side, 100.0, 0.15, 3.0);
        Position {
            side,
            entry_price: 100.0,
            stop_price: b.stop_price,
            target_price: b.target_price,
            contract_count: 1,
            entry_time: Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap(),
            status: PositionStatus::Open,
        }
    }

    #[test]
    fn touches_use_bar_range() {
        let long = position(Side::Long);
        assert!(long.stop_touched(101.0, 84.0));
        assert!(!long.stop_touched(101.0, 86.0));
        assert!(long.target_touched(146.0, 99.0));
        assert!(!long.target_touched(144.0, 99.0));

        let short = position(Side::Short);
        assert!(short.stop_touched(116.0, 99.0));
        assert!(!short.stop_touched(114.0, 99.0));
        assert!(short.target_touched(101.0, 54.0));
        assert!(!short.target_touched(101.0, 56.0));
    }

    #[test]
    fn closed_trade_pnl_is_signed() {
        let t = ClosedTrade {
            side: Side::Short,
            entry_price: 100.0,
            exit_price: 90.0,
            stop_price: 115.0,
            target_price: 55.0,
            contract_count: 1,
            entry_time: Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 3, 15, 15, 0, 0).unwrap(),
            exit_reason: ExitReason::Ema9Break,
        };
        assert!(approx(t.pnl_points(), 10.0));
        assert!(t.is_winner());
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::SessionClose.to_string(), "session_close");
        assert_eq!(ExitReason::EndOfData.to_string(), "end_of_data");
    }
}
