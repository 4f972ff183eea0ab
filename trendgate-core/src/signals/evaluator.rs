//! Signal evaluator: ordered predicates over the HTF and LTF snapshots.
//!
//! Evaluation per LTF bar:
//! 1. both snapshots must be ready, otherwise no trade;
//! 2. gates run in order and short-circuit (chop, trend strength, news);
//! 3. directional conditions run in order for each side and short-circuit;
//! 4. exactly one qualifying side yields an intent, two is an error.
//!
//! The evaluator holds no state between calls.

use chrono::{DateTime, Utc};

use crate::config::RiskConfig;
use crate::domain::{Bar, ReasonTag, Side, Timeframe, TradeIntent};
use crate::error::EngineError;
use crate::indicators::{IndicatorKey, IndicatorSnapshot, HTF_REQUIRED, LTF_REQUIRED};

use super::predicate::{
    ChopFilter, EntryPredicate, EvalContext, HtfTrend, LtfAlignment, LtfConfirmation, NewsBlackout,
    TrendStrength, VolumeConfirmation,
};

/// Outcome of one evaluation, with the reason when nothing fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Enter(TradeIntent),
    NotReady {
        timeframe: Timeframe,
        missing: IndicatorKey,
    },
    Blocked(ReasonTag),
    /// No side passed; each field names the first failing condition.
    NoSetup {
        long_failed: Option<ReasonTag>,
        short_failed: Option<ReasonTag>,
    },
}

impl Verdict {
    pub fn intent(&self) -> Option<&TradeIntent> {
        match self {
            Verdict::Enter(intent) => Some(intent),
            _ => None,
        }
    }

    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Enter(_) => "enter",
            Verdict::NotReady { .. } => "not_ready",
            Verdict::Blocked(_) => "blocked",
            Verdict::NoSetup { .. } => "no_setup",
        }
    }
}

#[derive(Debug)]
pub struct SignalEvaluator {
    gates: Vec<Box<dyn EntryPredicate>>,
    conditions: Vec<Box<dyn EntryPredicate>>,
}

impl SignalEvaluator {
    /// Default predicate chain parameterized by `risk`.
    pub fn from_config(risk: &RiskConfig) -> Self {
        Self {
            gates: vec![
                Box::new(ChopFilter {
                    band_pct: risk.chop_band_pct,
                }),
                Box::new(TrendStrength {
                    floor: risk.adx_floor,
                }),
                Box::new(NewsBlackout),
            ],
            conditions: vec![
                Box::new(HtfTrend),
                Box::new(LtfAlignment),
                Box::new(LtfConfirmation),
                Box::new(VolumeConfirmation {
                    multiplier: risk.volume_multiplier,
                }),
            ],
        }
    }

    /// Custom chain, run in the given order.
    pub fn with_predicates(
        gates: Vec<Box<dyn EntryPredicate>>,
        conditions: Vec<Box<dyn EntryPredicate>>,
    ) -> Self {
        Self { gates, conditions }
    }

    pub fn gate_tags(&self) -> Vec<ReasonTag> {
        self.gates.iter().map(|p| p.tag()).collect()
    }

    pub fn condition_tags(&self) -> Vec<ReasonTag> {
        self.conditions.iter().map(|p| p.tag()).collect()
    }

    /// Full verdict. Errors only on ambiguity.
    pub fn assess(
        &self,
        htf: &IndicatorSnapshot,
        ltf: &IndicatorSnapshot,
        ltf_bar: &Bar,
        news_blackout: bool,
    ) -> Result<Verdict, EngineError> {
        for (snap, required) in [(htf, HTF_REQUIRED), (ltf, LTF_REQUIRED)] {
            if let Some(missing) = snap.first_missing(required) {
                return Ok(Verdict::NotReady {
                    timeframe: snap.timeframe(),
                    missing,
                });
            }
        }

        let ctx = EvalContext {
            htf,
            ltf,
            ltf_bar,
            news_blackout,
        };

        // Gates do not depend on side.
        if let Some(gate) = self.gates.iter().find(|g| !g.holds(&ctx, Side::Long)) {
            return Ok(Verdict::Blocked(gate.tag()));
        }

        let long_failed = self.first_failing(&ctx, Side::Long);
        let short_failed = self.first_failing(&ctx, Side::Short);
        let timestamp = ltf_bar.close_time();

        match (long_failed, short_failed) {
            (None, None) => Err(EngineError::AmbiguousSignal { timestamp }),
            (None, Some(_)) => Ok(Verdict::Enter(self.intent(Side::Long, timestamp))),
            (Some(_), None) => Ok(Verdict::Enter(self.intent(Side::Short, timestamp))),
            (long_failed, short_failed) => Ok(Verdict::NoSetup {
                long_failed,
                short_failed,
            }),
        }
    }

    /// `Some(intent)` when exactly one side qualifies, `None` otherwise.
    ///
    /// Both sides qualifying is reported as [`EngineError::AmbiguousSignal`]
    /// and never resolved to a side.
    pub fn evaluate(
        &self,
        htf: &IndicatorSnapshot,
        ltf: &IndicatorSnapshot,
        ltf_bar: &Bar,
        news_blackout: bool,
    ) -> Result<Option<TradeIntent>, EngineError> {
        let verdict = self.assess(htf, ltf, ltf_bar, news_blackout)?;
        Ok(match verdict {
            Verdict::Enter(intent) => Some(intent),
            _ => None,
        })
    }

    fn first_failing(&self, ctx: &EvalContext<'_>, side: Side) -> Option<ReasonTag> {
        self.conditions
            .iter()
            .find(|c| !c.holds(ctx, side))
            .map(|c| c.tag())
    }

    fn intent(&self, side: Side, timestamp: DateTime<Utc>) -> TradeIntent {
        TradeIntent::new(side, timestamp).with_reasons(
            self.gates
                .iter()
                .chain(self.conditions.iter())
                .map(|p| p.tag()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(tf: Timeframe, open: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timeframe: tf,
            open_time: Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume,
        }
    }

    fn htf() -> IndicatorSnapshot {
        IndicatorSnapshot::new(bar(Timeframe::H1, 2045.0, 2050.0, 20_000.0), 300)
            .with(IndicatorKey::EmaTrend, 2000.0)
            .with(IndicatorKey::MacdHist, 1.2)
            .with(IndicatorKey::Adx, 25.0)
    }

    fn ltf() -> IndicatorSnapshot {
        IndicatorSnapshot::new(bar(Timeframe::M5, 2039.0, 2042.0, 1500.0), 120)
            .with(IndicatorKey::EmaFast, 2041.0)
            .with(IndicatorKey::EmaMid, 2038.0)
            .with(IndicatorKey::EmaSlow, 2030.0)
            .with(IndicatorKey::Vwap, 2040.0)
            .with(IndicatorKey::VolumeSma, 1200.0)
    }

    fn evaluator() -> SignalEvaluator {
        SignalEvaluator::from_config(&RiskConfig::default())
    }

    #[test]
    fn long_setup_fires_with_all_tags() {
        let (h, l) = (htf(), ltf());
        let intent = evaluator().evaluate(&h, &l, &l.bar, false).unwrap().unwrap();
        assert_eq!(intent.side, Side::Long);
        assert_eq!(intent.reasons.len(), 7);
        assert!(intent.reasons.contains(&ReasonTag::HtfTrend));
        assert!(intent.reasons.contains(&ReasonTag::VolumeConfirmation));
        assert_eq!(intent.timestamp, l.bar.close_time());
    }

    #[test]
    fn mirrored_short_setup_fires() {
        let h = IndicatorSnapshot::new(bar(Timeframe::H1, 1955.0, 1950.0, 20_000.0), 300)
            .with(IndicatorKey::EmaTrend, 2000.0)
            .with(IndicatorKey::MacdHist, -1.2)
            .with(IndicatorKey::Adx, 25.0);
        let l = IndicatorSnapshot::new(bar(Timeframe::M5, 1961.0, 1958.0, 1500.0), 120)
            .with(IndicatorKey::EmaFast, 1959.0)
            .with(IndicatorKey::EmaMid, 1962.0)
            .with(IndicatorKey::EmaSlow, 1970.0)
            .with(IndicatorKey::Vwap, 1960.0)
            .with(IndicatorKey::VolumeSma, 1200.0);
        let intent = evaluator().evaluate(&h, &l, &l.bar, false).unwrap().unwrap();
        assert_eq!(intent.side, Side::Short);
    }

    #[test]
    fn chop_blocks_regardless_of_setup() {
        let h = htf();
        let mut l = ltf();
        // 0.3% above EMA200; everything else still bullish
        l.bar.open = 2004.0;
        l.bar.close = 2006.0;
        let l = l
            .with(IndicatorKey::EmaFast, 2005.0)
            .with(IndicatorKey::EmaMid, 2003.0)
            .with(IndicatorKey::EmaSlow, 2001.0)
            .with(IndicatorKey::Vwap, 2004.0);
        let verdict = evaluator().assess(&h, &l, &l.bar, false).unwrap();
        assert_eq!(verdict, Verdict::Blocked(ReasonTag::ChopFilter));
        assert_eq!(evaluator().evaluate(&h, &l, &l.bar, false).unwrap(), None);
    }

    #[test]
    fn weak_adx_blocks() {
        let h = htf().with(IndicatorKey::Adx, 15.0);
        let l = ltf();
        let verdict = evaluator().assess(&h, &l, &l.bar, false).unwrap();
        assert_eq!(verdict, Verdict::Blocked(ReasonTag::TrendStrength));
    }

    #[test]
    fn news_blackout_blocks() {
        let (h, l) = (htf(), ltf());
        let verdict = evaluator().assess(&h, &l, &l.bar, true).unwrap();
        assert_eq!(verdict, Verdict::Blocked(ReasonTag::NewsBlackout));
    }

    #[test]
    fn not_ready_until_snapshots_complete() {
        let h = IndicatorSnapshot::new(htf().bar, 50)
            .with(IndicatorKey::MacdHist, 1.2)
            .with(IndicatorKey::Adx, 25.0);
        let l = ltf();
        let verdict = evaluator().assess(&h, &l, &l.bar, false).unwrap();
        assert_eq!(
            verdict,
            Verdict::NotReady {
                timeframe: Timeframe::H1,
                missing: IndicatorKey::EmaTrend
            }
        );

        let l = IndicatorSnapshot::new(ltf().bar, 10);
        let verdict = evaluator().assess(&htf(), &l, &l.bar, false).unwrap();
        assert!(matches!(
            verdict,
            Verdict::NotReady {
                timeframe: Timeframe::M5,
                ..
            }
        ));
    }

    #[test]
    fn no_setup_reports_first_failing_condition() {
        let h = htf();
        let l = ltf().with(IndicatorKey::VolumeSma, 2000.0);
        let verdict = evaluator().assess(&h, &l, &l.bar, false).unwrap();
        assert_eq!(
            verdict,
            Verdict::NoSetup {
                long_failed: Some(ReasonTag::VolumeConfirmation),
                short_failed: Some(ReasonTag::HtfTrend),
            }
        );
    }

    /// Holds for either side; stands in for a contradictory input feed.
    #[derive(Debug)]
    struct Symmetric;

    impl EntryPredicate for Symmetric {
        fn tag(&self) -> ReasonTag {
            ReasonTag::Custom("symmetric".into())
        }

        fn holds(&self, _ctx: &EvalContext<'_>, _side: Side) -> bool {
            true
        }
    }

    #[test]
    fn both_sides_qualifying_is_ambiguous() {
        let ev = SignalEvaluator::with_predicates(
            vec![Box::new(ChopFilter { band_pct: 0.005 })],
            vec![Box::new(Symmetric)],
        );
        let (h, l) = (htf(), ltf());
        let err = ev.evaluate(&h, &l, &l.bar, false).unwrap_err();
        assert!(matches!(err, EngineError::AmbiguousSignal { .. }));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let (h, l) = (htf(), ltf());
        let ev = evaluator();
        let a = ev.assess(&h, &l, &l.bar, false).unwrap();
        let b = ev.assess(&h, &l, &l.bar, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn default_chain_order() {
        let ev = evaluator();
        assert_eq!(
            ev.gate_tags(),
            vec![ReasonTag::ChopFilter, ReasonTag::TrendStrength, ReasonTag::NewsBlackout]
        );
        assert_eq!(
            ev.condition_tags(),
            vec![
                ReasonTag::HtfTrend,
                ReasonTag::LtfAlignment,
                ReasonTag::LtfConfirmation,
                ReasonTag::VolumeConfirmation
            ]
        );
    }
}
