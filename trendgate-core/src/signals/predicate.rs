//! Entry predicates: named checks the evaluator runs in order.
//!
//! Gates apply to both directions and ignore the side argument. Directional
//! conditions are written for the long side; the short side is the mirrored,
//! sign-flipped comparison.
//!
//! A predicate whose inputs are missing does not hold.

use std::fmt;

use crate::domain::{Bar, ReasonTag, Side};
use crate::indicators::{IndicatorKey, IndicatorSnapshot};

/// Everything a predicate may look at for one LTF bar.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub htf: &'a IndicatorSnapshot,
    pub ltf: &'a IndicatorSnapshot,
    pub ltf_bar: &'a Bar,
    pub news_blackout: bool,
}

/// Trait for entry predicates.
///
/// # Architecture invariant
/// Predicates see market state only, never the position or account.
pub trait EntryPredicate: Send + Sync + fmt::Debug {
    /// Tag recorded on the intent when this predicate holds.
    fn tag(&self) -> ReasonTag;

    fn holds(&self, ctx: &EvalContext<'_>, side: Side) -> bool;
}

/// `a` is beyond `b` in the direction of `side`.
fn beyond(side: Side, a: f64, b: f64) -> bool {
    match side {
        Side::Long => a > b,
        Side::Short => a < b,
    }
}

/// Blocks entries while price sits within `band_pct` of the HTF trend EMA.
#[derive(Debug, Clone)]
pub struct ChopFilter {
    pub band_pct: f64,
}

impl EntryPredicate for ChopFilter {
    fn tag(&self) -> ReasonTag {
        ReasonTag::ChopFilter
    }

    fn holds(&self, ctx: &EvalContext<'_>, _side: Side) -> bool {
        match ctx.htf.get(IndicatorKey::EmaTrend) {
            Some(ema) if ema > 0.0 => (ctx.ltf_bar.close - ema).abs() / ema >= self.band_pct,
            _ => false,
        }
    }
}

/// Requires HTF ADX at or above `floor`.
#[derive(Debug, Clone)]
pub struct TrendStrength {
    pub floor: f64,
}

impl EntryPredicate for TrendStrength {
    fn tag(&self) -> ReasonTag {
        ReasonTag::TrendStrength
    }

    fn holds(&self, ctx: &EvalContext<'_>, _side: Side) -> bool {
        ctx.htf
            .get(IndicatorKey::Adx)
            .is_some_and(|adx| adx >= self.floor)
    }
}

/// Blocks entries during a news blackout.
#[derive(Debug, Clone, Default)]
pub struct NewsBlackout;

impl EntryPredicate for NewsBlackout {
    fn tag(&self) -> ReasonTag {
        ReasonTag::NewsBlackout
    }

    fn holds(&self, ctx: &EvalContext<'_>, _side: Side) -> bool {
        !ctx.news_blackout
    }
}

/// HTF close beyond the trend EMA and HTF MACD histogram on the same side of zero.
#[derive(Debug, Clone, Default)]
pub struct HtfTrend;

impl EntryPredicate for HtfTrend {
    fn tag(&self) -> ReasonTag {
        ReasonTag::HtfTrend
    }

    fn holds(&self, ctx: &EvalContext<'_>, side: Side) -> bool {
        let (Some(ema), Some(hist)) = (
            ctx.htf.get(IndicatorKey::EmaTrend),
            ctx.htf.get(IndicatorKey::MacdHist),
        ) else {
            return false;
        };
        beyond(side, ctx.htf.close(), ema) && beyond(side, hist, 0.0)
    }
}

/// LTF EMAs stacked fast > mid > slow (reversed for shorts).
#[derive(Debug, Clone, Default)]
pub struct LtfAlignment;

impl EntryPredicate for LtfAlignment {
    fn tag(&self) -> ReasonTag {
        ReasonTag::LtfAlignment
    }

    fn holds(&self, ctx: &EvalContext<'_>, side: Side) -> bool {
        let (Some(fast), Some(mid), Some(slow)) = (
            ctx.ltf.get(IndicatorKey::EmaFast),
            ctx.ltf.get(IndicatorKey::EmaMid),
            ctx.ltf.get(IndicatorKey::EmaSlow),
        ) else {
            return false;
        };
        beyond(side, fast, mid) && beyond(side, mid, slow)
    }
}

/// LTF bar closes beyond the mid EMA and VWAP, and the bar body points the same way.
#[derive(Debug, Clone, Default)]
pub struct LtfConfirmation;

impl EntryPredicate for LtfConfirmation {
    fn tag(&self) -> ReasonTag {
        ReasonTag::LtfConfirmation
    }

    fn holds(&self, ctx: &EvalContext<'_>, side: Side) -> bool {
        let (Some(mid), Some(vwap)) = (
            ctx.ltf.get(IndicatorKey::EmaMid),
            ctx.ltf.get(IndicatorKey::Vwap),
        ) else {
            return false;
        };
        let bar = ctx.ltf_bar;
        beyond(side, bar.close, mid) && beyond(side, bar.close, vwap) && beyond(side, bar.close, bar.open)
    }
}

/// LTF volume above `multiplier ×` its SMA. Direction-agnostic.
#[derive(Debug, Clone)]
pub struct VolumeConfirmation {
    pub multiplier: f64,
}

impl EntryPredicate for VolumeConfirmation {
    fn tag(&self) -> ReasonTag {
        ReasonTag::VolumeConfirmation
    }

    fn holds(&self, ctx: &EvalContext<'_>, _side: Side) -> bool {
        ctx.ltf
            .get(IndicatorKey::VolumeSma)
            .is_some_and(|sma| ctx.ltf_bar.volume > self.multiplier * sma)
    }
}
