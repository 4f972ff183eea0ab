//! Bar aggregator: raw prints or finer bars in, closed bars per timeframe out.
//!
//! Each target timeframe buffers its own partial bar. A partial bar closes
//! when the input crosses its epoch-aligned boundary:
//! - a print stamped in a later bucket closes the current one;
//! - a pre-built bar whose end reaches the bucket end closes it at once.
//!
//! Gaps are not filled. Input must be strictly increasing in time.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::{Bar, PriceEvent, Timeframe};
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
struct PartialBar {
    open_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl PartialBar {
    fn start(open_time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn absorb(&mut self, high: f64, low: f64, close: f64, volume: f64) {
        self.high = self.high.max(high);
        self.low = self.low.min(low);
        self.close = close;
        self.volume += volume;
    }

    fn finish(self, timeframe: Timeframe) -> Bar {
        Bar {
            timeframe,
            open_time: self.open_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarAggregator {
    targets: Vec<Timeframe>,
    partials: BTreeMap<Timeframe, PartialBar>,
    last_admitted: Option<DateTime<Utc>>,
}

impl BarAggregator {
    pub fn new(targets: &[Timeframe]) -> Self {
        let mut targets = targets.to_vec();
        targets.sort();
        targets.dedup();
        Self {
            targets,
            partials: BTreeMap::new(),
            last_admitted: None,
        }
    }

    pub fn targets(&self) -> &[Timeframe] {
        &self.targets
    }

    fn admit(&self, stream: &str, ts: DateTime<Utc>) -> Result<(), EngineError> {
        match self.last_admitted {
            Some(last) if ts <= last => Err(EngineError::OutOfOrderData {
                stream: stream.to_string(),
                timestamp: ts,
                last_admitted: last,
            }),
            _ => Ok(()),
        }
    }

    /// Consume one print. Returns the bars it closed, earliest boundary first
    /// and shorter timeframes first within a boundary.
    pub fn push_event(&mut self, event: &PriceEvent) -> Result<Vec<Bar>, EngineError> {
        if !event.is_sane() {
            return Err(EngineError::InvalidMarketData {
                timestamp: event.timestamp,
                reason: format!("price {} volume {}", event.price, event.volume),
            });
        }
        self.admit("ticks", event.timestamp)?;
        self.last_admitted = Some(event.timestamp);

        let mut closed = Vec::new();
        for &tf in &self.targets {
            let bucket = tf.bucket_start(event.timestamp);
            let p = event.price;
            match self.partials.get_mut(&tf) {
                Some(partial) if partial.open_time == bucket => {
                    partial.absorb(p, p, p, event.volume);
                    continue;
                }
                _ => {}
            }
            let fresh = PartialBar::start(bucket, p, p, p, p, event.volume);
            if let Some(done) = self.partials.insert(tf, fresh) {
                closed.push(done.finish(tf));
            }
        }
        sort_emitted(&mut closed);
        Ok(closed)
    }

    /// Consume one pre-built bar of a timeframe that divides every target.
    pub fn push_bar(&mut self, bar: &Bar) -> Result<Vec<Bar>, EngineError> {
        if !bar.is_sane() {
            return Err(EngineError::InvalidMarketData {
                timestamp: bar.open_time,
                reason: "OHLCV failed sanity check".into(),
            });
        }
        if bar.timeframe.bucket_start(bar.open_time) != bar.open_time {
            return Err(EngineError::InvalidMarketData {
                timestamp: bar.open_time,
                reason: format!("open time not aligned to {}", bar.timeframe),
            });
        }
        if let Some(&tf) = self.targets.iter().find(|tf| !bar.timeframe.divides(**tf)) {
            return Err(EngineError::InvalidMarketData {
                timestamp: bar.open_time,
                reason: format!("{} bars cannot build {tf} bars", bar.timeframe),
            });
        }
        self.admit(&format!("bars/{}", bar.timeframe), bar.open_time)?;
        self.last_admitted = Some(bar.open_time);

        let bar_end = bar.close_time();
        let mut closed = Vec::new();
        for &tf in &self.targets {
            let bucket = tf.bucket_start(bar.open_time);
            let stale = self
                .partials
                .get(&tf)
                .is_some_and(|p| p.open_time != bucket);
            if stale {
                if let Some(done) = self.partials.remove(&tf) {
                    closed.push(done.finish(tf));
                }
            }
            match self.partials.get_mut(&tf) {
                Some(partial) => partial.absorb(bar.high, bar.low, bar.close, bar.volume),
                None => {
                    self.partials.insert(
                        tf,
                        PartialBar::start(bucket, bar.open, bar.high, bar.low, bar.close, bar.volume),
                    );
                }
            }
            if bar_end == bucket + tf.duration() {
                if let Some(done) = self.partials.remove(&tf) {
                    closed.push(done.finish(tf));
                }
            }
        }
        sort_emitted(&mut closed);
        Ok(closed)
    }

    pub fn reset(&mut self) {
        self.partials.clear();
        self.last_admitted = None;
    }
}

fn sort_emitted(bars: &mut [Bar]) {
    bars.sort_by_key(|b| (b.close_time(), b.timeframe));
}
