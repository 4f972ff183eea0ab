//! Simple Moving Average over a fixed trailing window.
//!
//! Keeps a ring buffer of the last `period` inputs and a running sum, so each
//! update is O(1). The running sum is rebuilt from the buffer every
//! `period` updates to stop floating-point drift.

use std::collections::VecDeque;

use crate::domain::Bar;

use super::StreamingIndicator;

/// Which bar field feeds the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaSource {
    Close,
    Volume,
}

#[derive(Debug, Clone)]
pub struct RollingSma {
    period: usize,
    source: SmaSource,
    window: VecDeque<f64>,
    sum: f64,
    since_rebuild: usize,
    name: String,
}

impl RollingSma {
    pub fn new(period: usize, source: SmaSource) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let name = match source {
            SmaSource::Close => format!("sma_{period}"),
            SmaSource::Volume => format!("volume_sma_{period}"),
        };
        Self {
            period,
            source,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            since_rebuild: 0,
            name,
        }
    }

    pub fn push(&mut self, x: f64) -> Option<f64> {
        self.window.push_back(x);
        self.sum += x;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.since_rebuild += 1;
        if self.since_rebuild >= self.period {
            self.sum = self.window.iter().sum();
            self.since_rebuild = 0;
        }
        self.value()
    }
}

impl StreamingIndicator for RollingSma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        let x = match self.source {
            SmaSource::Close => bar.close,
            SmaSource::Volume => bar.volume,
        };
        self.push(x)
    }

    fn value(&self) -> Option<f64> {
        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.since_rebuild = 0;
    }
}
