//! Trade summary statistics over closed round trips.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use trendgate_core::domain::{ClosedTrade, ExitReason};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub net_points: f64,
    /// `net_points × point_value`.
    pub net_pnl: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub exits: BTreeMap<ExitReason, usize>,
}

impl TradeSummary {
    pub fn compute(trades: &[ClosedTrade], point_value: f64) -> Self {
        let mut exits = BTreeMap::new();
        for t in trades {
            *exits.entry(t.exit_reason).or_insert(0) += 1;
        }
        let pnl: Vec<f64> = trades.iter().map(ClosedTrade::pnl_points).collect();
        let net_points: f64 = pnl.iter().sum();
        Self {
            trades: trades.len(),
            wins: pnl.iter().filter(|p| **p > 0.0).count(),
            losses: pnl.iter().filter(|p| **p < 0.0).count(),
            win_rate: win_rate(&pnl),
            net_points,
            net_pnl: net_points * point_value,
            profit_factor: profit_factor(&pnl),
            largest_win: pnl.iter().copied().filter(|p| *p > 0.0).fold(0.0, f64::max),
            largest_loss: pnl.iter().copied().filter(|p| *p < 0.0).fold(0.0, f64::min),
            exits,
        }
    }
}

/// Fraction of trades with positive P&L.
pub fn win_rate(pnl: &[f64]) -> f64 {
    if pnl.is_empty() {
        return 0.0;
    }
    pnl.iter().filter(|p| **p > 0.0).count() as f64 / pnl.len() as f64
}

/// Gross profit / gross loss, capped at 100.0 when there are no losers.
pub fn profit_factor(pnl: &[f64]) -> f64 {
    let gross_profit: f64 = pnl.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = pnl.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

impl fmt::Display for TradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "trades {}  wins {}  losses {}  win rate {:.1}%",
            self.trades,
            self.wins,
            self.losses,
            self.win_rate * 100.0
        )?;
        writeln!(
            f,
            "net {:+.2} pts ({:+.2})  profit factor {:.2}",
            self.net_points, self.net_pnl, self.profit_factor
        )?;
        write!(
            f,
            "largest win {:+.2} pts  largest loss {:+.2} pts",
            self.largest_win, self.largest_loss
        )?;
        for (reason, count) in &self.exits {
            write!(f, "\n  {:<14} {count}", reason.to_string())?;
        }
        Ok(())
    }
}
