//! Streaming indicators and the per-timeframe indicator engine.
//!
//! Every indicator implements [`StreamingIndicator`]: it consumes one closed
//! bar at a time and carries only fixed-size state (previous smoothed values,
//! running sums, bounded queues). Nothing is ever recomputed from history.
//!
//! Values are `None` until the indicator's warm-up is satisfied; the snapshot
//! simply omits them.

pub mod adx;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod sma;
pub mod snapshot;
pub mod vwap;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Bar;

pub use adx::{Adx, AdxReading, WilderSmoother};
pub use ema::Ema;
pub use engine::IndicatorEngine;
pub use macd::{Macd, MacdReading};
pub use sma::{RollingSma, SmaSource};
pub use snapshot::{IndicatorSnapshot, HTF_REQUIRED, LTF_REQUIRED};
pub use vwap::SessionVwap;

/// Incrementally updated indicator.
pub trait StreamingIndicator: Send + Sync {
    /// Human-readable name, e.g. `ema_21`.
    fn name(&self) -> &str;

    /// Number of bars required before the first defined value.
    fn lookback(&self) -> usize;

    /// Consume one closed bar and return the new value.
    fn update(&mut self, bar: &Bar) -> Option<f64>;

    /// Latest value without consuming input.
    fn value(&self) -> Option<f64>;

    /// Drop all state.
    fn reset(&mut self);
}

/// Named slot in an [`IndicatorSnapshot`].
///
/// EMA slots are named by role; their periods come from
/// [`crate::config::IndicatorConfig`] (9/21/60/200 by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKey {
    EmaFast,
    EmaMid,
    EmaSlow,
    EmaTrend,
    MacdLine,
    MacdSignal,
    MacdHist,
    Vwap,
    Adx,
    VolumeSma,
}

impl IndicatorKey {
    pub const ALL: [IndicatorKey; 10] = [
        Self::EmaFast,
        Self::EmaMid,
        Self::EmaSlow,
        Self::EmaTrend,
        Self::MacdLine,
        Self::MacdSignal,
        Self::MacdHist,
        Self::Vwap,
        Self::Adx,
        Self::VolumeSma,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmaFast => "ema_fast",
            Self::EmaMid => "ema_mid",
            Self::EmaSlow => "ema_slow",
            Self::EmaTrend => "ema_trend",
            Self::MacdLine => "macd_line",
            Self::MacdSignal => "macd_signal",
            Self::MacdHist => "macd_hist",
            Self::Vwap => "vwap",
            Self::Adx => "adx",
            Self::VolumeSma => "volume_sma",
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed every bar to an indicator and collect the outputs.
#[cfg(test)]
pub fn feed(ind: &mut dyn StreamingIndicator, bars: &[Bar]) -> Vec<Option<f64>> {
    bars.iter().map(|b| ind.update(b)).collect()
}

/// Create synthetic 5-minute bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let ohlc: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_bars(&ohlc)
}

/// Create synthetic 5-minute bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    use crate::domain::Timeframe;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 14, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timeframe: Timeframe::M5,
            open_time: base + Timeframe::M5.duration() * i as i32,
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
