//! Exponential Moving Average (EMA), streaming.
//!
//! Seed: SMA of the first `period` inputs. Then:
//! `EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1]` with `alpha = 2 / (period + 1)`.
//!
//! Lookback = period. Undefined until `period` inputs have been observed.

use crate::domain::Bar;

use super::StreamingIndicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            value: None,
            name: format!("ema_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed one raw input value.
    pub fn push(&mut self, x: f64) -> Option<f64> {
        self.seen += 1;
        match self.value {
            Some(prev) => {
                self.value = Some(self.alpha * x + (1.0 - self.alpha) * prev);
            }
            None => {
                self.seed_sum += x;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

impl StreamingIndicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.push(bar.close)
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        self.seen = 0;
        self.seed_sum = 0.0;
        self.value = None;
    }
}
