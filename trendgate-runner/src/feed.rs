//! CSV market data.
//!
//! Ticks: `timestamp,price,volume`. Bars: `timestamp,open,high,low,close,volume`
//! with the timestamp at bar open.
//!
//! Timestamps are RFC 3339 (`2024-03-15T14:35:00Z`, any offset) or naive local
//! times (`2024-03-15 10:35:00`) in the feed zone. Naive times that are
//! ambiguous or skipped by a DST transition are rejected rather than guessed.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::offset::LocalResult;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;
use trendgate_core::domain::{Bar, MarketEvent, PriceEvent, Timeframe};

use crate::config::{FeedConfig, FeedKind};
use crate::error::RunnerError;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TickRow {
    timestamp: String,
    price: f64,
    volume: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse one feed timestamp. `row` is only used in the error.
pub fn parse_timestamp(value: &str, zone: Tz, row: usize) -> Result<DateTime<Utc>, RunnerError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| RunnerError::Timestamp {
            row,
            value: value.to_string(),
            reason: "unrecognized format".into(),
        })?;
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => Err(RunnerError::Timestamp {
            row,
            value: value.to_string(),
            reason: format!("ambiguous local time in {zone}"),
        }),
        LocalResult::None => Err(RunnerError::Timestamp {
            row,
            value: value.to_string(),
            reason: format!("nonexistent local time in {zone}"),
        }),
    }
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input)
}

pub fn read_ticks<R: Read>(input: R, zone: Tz) -> Result<Vec<MarketEvent>, RunnerError> {
    let mut events = Vec::new();
    for (i, row) in reader(input).deserialize::<TickRow>().enumerate() {
        let row = row?;
        // header is line 1
        let timestamp = parse_timestamp(&row.timestamp, zone, i + 2)?;
        events.push(MarketEvent::Tick(PriceEvent::new(
            timestamp, row.price, row.volume,
        )));
    }
    Ok(events)
}

pub fn read_bars<R: Read>(
    input: R,
    timeframe: Timeframe,
    zone: Tz,
) -> Result<Vec<MarketEvent>, RunnerError> {
    let mut events = Vec::new();
    for (i, row) in reader(input).deserialize::<BarRow>().enumerate() {
        let row = row?;
        let open_time = parse_timestamp(&row.timestamp, zone, i + 2)?;
        events.push(MarketEvent::Bar(Bar {
            timeframe,
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }));
    }
    Ok(events)
}

/// Load the configured feed from disk.
pub fn load_feed(feed: &FeedConfig, zone: Tz) -> Result<Vec<MarketEvent>, RunnerError> {
    let file = File::open(&feed.path).map_err(|e| RunnerError::io(&feed.path, e))?;
    let events = match feed.kind {
        FeedKind::Ticks => read_ticks(file, zone)?,
        FeedKind::Bars => read_bars(file, feed.timeframe, zone)?,
    };
    info!(
        path = %feed.path.display(),
        kind = ?feed.kind,
        events = events.len(),
        "feed loaded"
    );
    Ok(events)
}

/// Write ticks as CSV with UTC RFC 3339 timestamps.
pub fn write_ticks<W: Write>(output: W, ticks: &[PriceEvent]) -> Result<(), RunnerError> {
    let mut wtr = csv::Writer::from_writer(output);
    for tick in ticks {
        wtr.serialize(TickRow {
            timestamp: tick.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            price: tick.price,
            volume: tick.volume,
        })?;
    }
    wtr.flush().map_err(|e| RunnerError::io("<csv output>", e))?;
    Ok(())
}

pub fn write_ticks_file(path: &Path, ticks: &[PriceEvent]) -> Result<(), RunnerError> {
    let file = File::create(path).map_err(|e| RunnerError::io(path, e))?;
    write_ticks(file, ticks)
}
