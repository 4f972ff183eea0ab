//! Session VWAP.
//!
//! `VWAP = Σ(typical × volume) / Σ(volume)` with typical = (H + L + C) / 3,
//! accumulated from the first bar of the current trading session. The owner
//! calls [`StreamingIndicator::reset`] at each session rollover.
//!
//! Undefined while no volume has been accumulated in the session.

use crate::domain::Bar;

use super::StreamingIndicator;

#[derive(Debug, Clone, Default)]
pub struct SessionVwap {
    cum_pv: f64,
    cum_volume: f64,
    bars: usize,
}

impl SessionVwap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars accumulated in the current session.
    pub fn session_bars(&self) -> usize {
        self.bars
    }
}

impl StreamingIndicator for SessionVwap {
    fn name(&self) -> &str {
        "vwap"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.cum_pv += bar.typical_price() * bar.volume;
        self.cum_volume += bar.volume;
        self.bars += 1;
        self.value()
    }

    fn value(&self) -> Option<f64> {
        if self.cum_volume > 0.0 {
            Some(self.cum_pv / self.cum_volume)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
