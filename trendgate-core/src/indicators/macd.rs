//! MACD: moving average convergence/divergence.
//!
//! line = EMA(fast) − EMA(slow), signal = EMA(signal) of line, hist = line − signal.
//! The line is defined after `slow` bars; signal and histogram after
//! `slow + signal − 1` bars (the signal EMA seeds on the first `signal` line values).
//!
//! At 12/26/9 the histogram is therefore first defined on bar 34, not bar 35.
//! Readiness gating keys off the histogram value itself, so no extra bar is
//! waited for.

use crate::domain::Bar;

use super::{Ema, StreamingIndicator};

/// One MACD reading. Fields are `None` until warmed up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdReading {
    pub line: Option<f64>,
    pub signal: Option<f64>,
    pub hist: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    last: MacdReading,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast < slow, "MACD fast period must be shorter than slow");
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            last: MacdReading::default(),
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn push(&mut self, close: f64) -> MacdReading {
        let fast = self.fast.push(close);
        let slow = self.slow.push(close);
        let line = match (fast, slow) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        };
        let signal = line.and_then(|l| self.signal.push(l));
        let hist = match (line, signal) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        };
        self.last = MacdReading { line, signal, hist };
        self.last
    }

    pub fn reading(&self) -> MacdReading {
        self.last
    }
}

impl StreamingIndicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow.period() + self.signal.period() - 1
    }

    /// Returns the histogram.
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.push(bar.close).hist
    }

    fn value(&self) -> Option<f64> {
        self.last.hist
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
        self.last = MacdReading::default();
    }
}
