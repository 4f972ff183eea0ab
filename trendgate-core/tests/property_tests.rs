//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Bracket geometry: stop at max_loss_pct, target at reward_multiple × risk
//! 2. Position singleton: a position exists iff the state is not FLAT
//! 3. Aggregator consistency: emitted bars are aligned, ordered and OHLC-sane
//! 4. Warm-up: EMA values are absent until `period` bars were seen

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;

use trendgate_core::aggregator::BarAggregator;
use trendgate_core::config::RiskConfig;
use trendgate_core::domain::{Bar, Bracket, PriceEvent, Side, Timeframe, TradeIntent};
use trendgate_core::indicators::{Ema, IndicatorKey, IndicatorSnapshot};
use trendgate_core::position::{PositionManager, PositionState};
use trendgate_core::risk::RiskGuard;
use trendgate_core::session::{SessionClock, SessionWindow};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (100.0..5000.0_f64).prop_map(|p| (p * 10.0).round() / 10.0)
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

/// Strictly increasing tick gaps (seconds) with prices and volumes.
fn arb_ticks() -> impl Strategy<Value = Vec<(i64, f64, f64)>> {
    prop::collection::vec((1..400_i64, arb_price(), 0.0..50.0_f64), 1..300)
}

#[derive(Debug, Clone)]
enum Step {
    /// Propose an entry on a fresh bar.
    Intent(Side),
    /// Close a bar moving by `delta` points, with this LTF MACD histogram.
    Bar { delta: f64, hist: f64 },
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    let step = prop_oneof![
        arb_side().prop_map(Step::Intent),
        (-400.0..400.0_f64, -2.0..2.0_f64).prop_map(|(delta, hist)| Step::Bar { delta, hist }),
    ];
    prop::collection::vec(step, 1..80)
}

// ── 1. Bracket geometry ──────────────────────────────────────────────

proptest! {
    #[test]
    fn bracket_respects_loss_cap_and_reward(
        entry in arb_price(),
        side in arb_side(),
        pct in 0.01..0.5_f64,
        reward in 0.5..5.0_f64,
    ) {
        let b = Bracket::compute(side, entry, pct, reward);
        prop_assert!((b.loss_fraction(entry) - pct).abs() < 1e-9);
        let risk = side.sign() * (entry - b.stop_price);
        let gain = side.sign() * (b.target_price - entry);
        prop_assert!(risk > 0.0);
        prop_assert!((gain - reward * risk).abs() < 1e-6 * entry);
    }
}

// ── 2. Position singleton ────────────────────────────────────────────

fn window() -> SessionWindow {
    SessionWindow {
        start: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        zone: chrono_tz::America::New_York,
    }
}

fn snapshot(bar: &Bar, hist: f64) -> IndicatorSnapshot {
    IndicatorSnapshot::new(bar.clone(), 500)
        .with(IndicatorKey::EmaFast, bar.close)
        .with(IndicatorKey::EmaMid, bar.close)
        .with(IndicatorKey::EmaSlow, bar.close)
        .with(IndicatorKey::Vwap, bar.close)
        .with(IndicatorKey::VolumeSma, bar.volume)
        .with(IndicatorKey::MacdHist, hist)
}

fn htf_snapshot(bar: &Bar) -> IndicatorSnapshot {
    let htf_bar = Bar {
        timeframe: Timeframe::H1,
        ..bar.clone()
    };
    IndicatorSnapshot::new(htf_bar, 200)
        .with(IndicatorKey::EmaTrend, bar.close)
        .with(IndicatorKey::MacdHist, 0.0)
        .with(IndicatorKey::Adx, 25.0)
}

proptest! {
    #[test]
    fn position_exists_iff_not_flat(steps in arb_steps()) {
        let config = RiskConfig::default();
        let guard = RiskGuard::new(config.clone());
        let mut pm = PositionManager::new(config);
        let mut clock = SessionClock::new(window());

        // 09:30 EDT; long runs cross the 16:00 close
        let mut open_time = Utc.with_ymd_and_hms(2024, 3, 15, 13, 30, 0).unwrap();
        let mut price = 2000.0;

        for step in steps {
            let (delta, hist) = match step {
                Step::Intent(_) => (0.5, 0.0),
                Step::Bar { delta, hist } => (delta, hist),
            };
            let close = (price + delta).max(1.0);
            let bar = Bar {
                timeframe: Timeframe::M5,
                open_time,
                open: price,
                high: price.max(close) + 1.0,
                low: (price.min(close) - 1.0).max(0.5),
                close,
                volume: 100.0,
            };
            let snap = snapshot(&bar, hist);
            clock.advance(bar.close_time());

            pm.on_bar(&bar, &snap, &clock);
            if let Step::Intent(side) = step {
                let intent = TradeIntent::new(side, bar.close_time());
                let htf = htf_snapshot(&bar);
                let _ = pm.on_intent(&intent, &bar, &snap, &htf, &guard, &clock, None);
            }

            prop_assert_eq!(pm.position().is_some(), pm.state() != PositionState::Flat);
            prop_assert!(pm.state() != PositionState::Closing);
            if let Some(pos) = pm.position() {
                prop_assert_eq!(pos.contract_count, 1);
                prop_assert!((pos.bracket().loss_fraction(pos.entry_price) - 0.15).abs() < 1e-9);
            }
            for t in pm.drain_transitions() {
                prop_assert_eq!(t.timestamp, bar.close_time());
            }

            price = close;
            open_time += Duration::minutes(5);
        }
    }
}

// ── 3. Aggregator consistency ────────────────────────────────────────

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn aggregated_bars_are_aligned_ordered_and_sane(ticks in arb_ticks()) {
        let mut agg = BarAggregator::new(&Timeframe::STANDARD);
        let mut ts = base_time();
        let mut emitted: Vec<Bar> = Vec::new();
        let mut total_volume = 0.0;

        for (gap, price, volume) in ticks {
            ts += Duration::seconds(gap);
            total_volume += volume;
            emitted.extend(agg.push_event(&PriceEvent::new(ts, price, volume)).unwrap());
        }

        let mut last_open: BTreeMap<Timeframe, DateTime<Utc>> = BTreeMap::new();
        let mut volume_by_tf: BTreeMap<Timeframe, f64> = BTreeMap::new();
        for bar in &emitted {
            prop_assert_eq!(bar.timeframe.bucket_start(bar.open_time), bar.open_time);
            prop_assert!(bar.high >= bar.open.max(bar.close));
            prop_assert!(bar.low <= bar.open.min(bar.close));
            prop_assert!(bar.close_time() <= ts);
            if let Some(prev) = last_open.insert(bar.timeframe, bar.open_time) {
                prop_assert!(bar.open_time > prev);
            }
            *volume_by_tf.entry(bar.timeframe).or_insert(0.0) += bar.volume;
        }
        for v in volume_by_tf.values() {
            prop_assert!(*v <= total_volume + 1e-6);
        }
        for pair in emitted.windows(2) {
            prop_assert!(
                (pair[0].close_time(), pair[0].timeframe) <= (pair[1].close_time(), pair[1].timeframe)
            );
        }
    }

    #[test]
    fn stale_ticks_are_always_rejected(ticks in arb_ticks(), back in 0..600_i64) {
        let mut agg = BarAggregator::new(&Timeframe::STANDARD);
        let mut ts = base_time();
        for (gap, price, volume) in ticks {
            ts += Duration::seconds(gap);
            agg.push_event(&PriceEvent::new(ts, price, volume)).unwrap();
        }
        let stale = PriceEvent::new(ts - Duration::seconds(back), 2000.0, 1.0);
        prop_assert!(agg.push_event(&stale).is_err());
    }
}

// ── 4. Warm-up ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_undefined_before_period(
        period in 1..60_usize,
        closes in prop::collection::vec(arb_price(), 1..120),
    ) {
        let mut ema = Ema::new(period);
        for (i, close) in closes.iter().enumerate() {
            let value = ema.push(*close);
            prop_assert_eq!(value.is_some(), i + 1 >= period);
        }
    }
}
