//! IndicatorSnapshot: indicator values for one timeframe as of one closed bar.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{Bar, Timeframe};
use crate::error::EngineError;

use super::IndicatorKey;

/// Indicators the evaluator reads from the higher timeframe.
pub const HTF_REQUIRED: &[IndicatorKey] =
    &[IndicatorKey::EmaTrend, IndicatorKey::MacdHist, IndicatorKey::Adx];

/// Indicators the evaluator reads from the lower timeframe.
pub const LTF_REQUIRED: &[IndicatorKey] = &[
    IndicatorKey::EmaFast,
    IndicatorKey::EmaMid,
    IndicatorKey::EmaSlow,
    IndicatorKey::Vwap,
    IndicatorKey::VolumeSma,
];

/// Published once per closed bar and never mutated afterwards.
///
/// Indicators still warming up are absent from `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub bar: Bar,
    /// Bars consumed on this timeframe, including `bar`.
    pub bars_seen: usize,
    values: BTreeMap<IndicatorKey, f64>,
}

impl IndicatorSnapshot {
    pub fn new(bar: Bar, bars_seen: usize) -> Self {
        Self {
            bar,
            bars_seen,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert; non-finite values are dropped.
    pub fn with(mut self, key: IndicatorKey, value: f64) -> Self {
        self.set(key, Some(value));
        self
    }

    pub fn set(&mut self, key: IndicatorKey, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => {
                self.values.insert(key, v);
            }
            _ => {
                self.values.remove(&key);
            }
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.bar.timeframe
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    pub fn get(&self, key: IndicatorKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    /// Value or [`EngineError::InsufficientHistory`].
    pub fn require(&self, key: IndicatorKey) -> Result<f64, EngineError> {
        self.get(key).ok_or(EngineError::InsufficientHistory {
            timeframe: self.bar.timeframe,
            indicator: key,
        })
    }

    /// First required key that is still absent.
    pub fn first_missing(&self, required: &[IndicatorKey]) -> Option<IndicatorKey> {
        required.iter().copied().find(|k| !self.values.contains_key(k))
    }

    pub fn is_ready(&self, required: &[IndicatorKey]) -> bool {
        self.first_missing(required).is_none()
    }

    /// Ok if every required key is present.
    pub fn ensure_ready(&self, required: &[IndicatorKey]) -> Result<(), EngineError> {
        match self.first_missing(required) {
            Some(indicator) => Err(EngineError::InsufficientHistory {
                timeframe: self.bar.timeframe,
                indicator,
            }),
            None => Ok(()),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = (IndicatorKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
