//! ADX: Average Directional Index (Wilder), streaming.
//!
//! Steps per bar (from the second bar on):
//! 1. +DM, -DM and true range against the previous bar
//! 2. Wilder-smooth +DM, -DM and TR (seed = mean of the first `period` values, alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR), -DI likewise
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! DI/DX are defined after `period + 1` bars, ADX after `2 * period` bars.

use crate::domain::Bar;

use super::StreamingIndicator;

/// Wilder smoothing over a stream: mean-seeded, then `alpha = 1/period`.
#[derive(Debug, Clone)]
pub struct WilderSmoother {
    period: usize,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl WilderSmoother {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Wilder period must be >= 1");
        Self {
            period,
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn push(&mut self, x: f64) -> Option<f64> {
        self.seen += 1;
        self.value = match self.value {
            Some(prev) => {
                let alpha = 1.0 / self.period as f64;
                Some(alpha * x + (1.0 - alpha) * prev)
            }
            None => {
                self.seed_sum += x;
                (self.seen == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.period);
    }
}

/// True range against the previous close.
pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Directional index values for the latest bar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdxReading {
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub adx: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr: WilderSmoother,
    plus_dm: WilderSmoother,
    minus_dm: WilderSmoother,
    dx: WilderSmoother,
    last: AdxReading,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            prev: None,
            tr: WilderSmoother::new(period),
            plus_dm: WilderSmoother::new(period),
            minus_dm: WilderSmoother::new(period),
            dx: WilderSmoother::new(period),
            last: AdxReading::default(),
            name: format!("adx_{period}"),
        }
    }

    pub fn reading(&self) -> AdxReading {
        self.last
    }

    fn step(&mut self, bar: &Bar) -> AdxReading {
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((bar.high, bar.low, bar.close))
        else {
            return AdxReading::default();
        };

        let up = bar.high - prev_high;
        let down = prev_low - bar.low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };

        let tr = self.tr.push(true_range(bar, prev_close));
        let pdm = self.plus_dm.push(plus_dm);
        let mdm = self.minus_dm.push(minus_dm);

        let (Some(tr), Some(pdm), Some(mdm)) = (tr, pdm, mdm) else {
            return AdxReading::default();
        };
        if tr == 0.0 {
            // Flat tape: directional movement is undefined, carry the last ADX.
            return AdxReading {
                plus_di: None,
                minus_di: None,
                adx: self.dx.value(),
            };
        }

        let plus_di = 100.0 * pdm / tr;
        let minus_di = 100.0 * mdm / tr;
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };

        AdxReading {
            plus_di: Some(plus_di),
            minus_di: Some(minus_di),
            adx: self.dx.push(dx),
        }
    }
}

impl StreamingIndicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.last = self.step(bar);
        self.last.adx
    }

    fn value(&self) -> Option<f64> {
        self.last.adx
    }

    fn reset(&mut self) {
        *self = Self::new(self.period);
    }
}
