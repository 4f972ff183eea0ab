//! Indicator engine: one set of streaming indicators per timeframe.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::IndicatorConfig;
use crate::domain::{Bar, Timeframe};
use crate::error::EngineError;
use crate::session::SessionWindow;

use super::{
    Adx, Ema, IndicatorKey, IndicatorSnapshot, Macd, RollingSma, SessionVwap, SmaSource,
    StreamingIndicator,
};

/// Indicator state for a single timeframe.
#[derive(Debug, Clone)]
struct TimeframeIndicators {
    ema_fast: Ema,
    ema_mid: Ema,
    ema_slow: Ema,
    ema_trend: Ema,
    macd: Macd,
    vwap: SessionVwap,
    adx: Adx,
    volume_sma: RollingSma,
    trading_day: Option<NaiveDate>,
    last_open: Option<DateTime<Utc>>,
    bars_seen: usize,
    latest: Option<IndicatorSnapshot>,
}

impl TimeframeIndicators {
    fn new(config: &IndicatorConfig, volume_lookback: usize) -> Self {
        Self {
            ema_fast: Ema::new(config.ema_fast),
            ema_mid: Ema::new(config.ema_mid),
            ema_slow: Ema::new(config.ema_slow),
            ema_trend: Ema::new(config.ema_trend),
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal),
            vwap: SessionVwap::new(),
            adx: Adx::new(config.adx_period),
            volume_sma: RollingSma::new(volume_lookback, SmaSource::Volume),
            trading_day: None,
            last_open: None,
            bars_seen: 0,
            latest: None,
        }
    }

    fn update(&mut self, bar: &Bar, trading_day: NaiveDate) -> IndicatorSnapshot {
        if self.trading_day != Some(trading_day) {
            self.vwap.reset();
            self.trading_day = Some(trading_day);
        }
        self.bars_seen += 1;
        self.last_open = Some(bar.open_time);

        let macd = self.macd.push(bar.close);
        let mut snap = IndicatorSnapshot::new(bar.clone(), self.bars_seen);
        snap.set(IndicatorKey::EmaFast, self.ema_fast.update(bar));
        snap.set(IndicatorKey::EmaMid, self.ema_mid.update(bar));
        snap.set(IndicatorKey::EmaSlow, self.ema_slow.update(bar));
        snap.set(IndicatorKey::EmaTrend, self.ema_trend.update(bar));
        snap.set(IndicatorKey::MacdLine, macd.line);
        snap.set(IndicatorKey::MacdSignal, macd.signal);
        snap.set(IndicatorKey::MacdHist, macd.hist);
        snap.set(IndicatorKey::Vwap, self.vwap.update(bar));
        snap.set(IndicatorKey::Adx, self.adx.update(bar));
        snap.set(IndicatorKey::VolumeSma, self.volume_sma.update(bar));

        self.latest = Some(snap.clone());
        snap
    }
}

/// Maintains [`TimeframeIndicators`] for every timeframe it has seen.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
    volume_lookback: usize,
    window: SessionWindow,
    states: BTreeMap<Timeframe, TimeframeIndicators>,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig, volume_lookback: usize, window: SessionWindow) -> Self {
        Self {
            config,
            volume_lookback,
            window,
            states: BTreeMap::new(),
        }
    }

    /// Consume one closed bar and publish the new snapshot for its timeframe.
    ///
    /// Bars that do not advance past the last admitted bar of the same
    /// timeframe are rejected and leave the state untouched.
    pub fn update(&mut self, bar: &Bar) -> Result<IndicatorSnapshot, EngineError> {
        let state = self
            .states
            .entry(bar.timeframe)
            .or_insert_with(|| TimeframeIndicators::new(&self.config, self.volume_lookback));

        if let Some(last) = state.last_open {
            if bar.open_time <= last {
                return Err(EngineError::OutOfOrderData {
                    stream: format!("indicators/{}", bar.timeframe),
                    timestamp: bar.open_time,
                    last_admitted: last,
                });
            }
        }

        let day = self.window.trading_day(bar.open_time);
        let snap = state.update(bar, day);
        debug!(
            timeframe = %bar.timeframe,
            open_time = %bar.open_time,
            close = bar.close,
            defined = snap.len(),
            "indicators updated"
        );
        Ok(snap)
    }

    /// Latest snapshot for `timeframe`, if any bar has been consumed.
    pub fn snapshot(&self, timeframe: Timeframe) -> Option<&IndicatorSnapshot> {
        self.states.get(&timeframe).and_then(|s| s.latest.as_ref())
    }

    pub fn bars_seen(&self, timeframe: Timeframe) -> usize {
        self.states.get(&timeframe).map_or(0, |s| s.bars_seen)
    }

    pub fn reset(&mut self) {
        self.states.clear();
    }
}
