//! Trade tape export: one CSV row per closed round trip.
//!
//! Columns: entry_time, exit_time, side, contracts, entry_price, exit_price,
//! stop_price, target_price, exit_reason, pnl_points, pnl

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use trendgate_core::domain::ClosedTrade;

use crate::error::RunnerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub entry_time: String,
    pub exit_time: String,
    pub side: String,
    pub contracts: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub exit_reason: String,
    pub pnl_points: f64,
    /// Currency P&L at the configured point value.
    pub pnl: f64,
}

impl TradeRow {
    pub fn from_trade(trade: &ClosedTrade, point_value: f64) -> Self {
        let pnl_points = trade.pnl_points();
        Self {
            entry_time: trade.entry_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            exit_time: trade.exit_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            side: trade.side.to_string(),
            contracts: trade.contract_count,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            stop_price: trade.stop_price,
            target_price: trade.target_price,
            exit_reason: trade.exit_reason.to_string(),
            pnl_points,
            pnl: pnl_points * point_value,
        }
    }
}

/// Write the trade tape with a header row, even when there are no trades.
pub fn write_trades<W: Write>(
    output: W,
    trades: &[ClosedTrade],
    point_value: f64,
) -> Result<(), RunnerError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    wtr.write_record([
        "entry_time",
        "exit_time",
        "side",
        "contracts",
        "entry_price",
        "exit_price",
        "stop_price",
        "target_price",
        "exit_reason",
        "pnl_points",
        "pnl",
    ])?;
    for trade in trades {
        wtr.serialize(TradeRow::from_trade(trade, point_value))?;
    }
    wtr.flush().map_err(|e| RunnerError::io("<csv output>", e))?;
    Ok(())
}

pub fn write_trades_file(
    path: &Path,
    trades: &[ClosedTrade],
    point_value: f64,
) -> Result<(), RunnerError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| RunnerError::io(dir, e))?;
    }
    let file = File::create(path).map_err(|e| RunnerError::io(path, e))?;
    write_trades(file, trades, point_value)
}
