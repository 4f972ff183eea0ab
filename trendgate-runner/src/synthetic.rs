//! Deterministic synthetic tick generation for demos and tests.
//!
//! A seeded random walk with slowly switching drift regimes, so that both
//! trending and choppy stretches show up. Weekends (UTC) are skipped.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trendgate_core::domain::PriceEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub instrument: String,
    pub seed: u64,
    pub start_date: NaiveDate,
    /// Calendar days, weekends included in the count but not generated.
    pub days: u32,
    pub start_price: f64,
    pub tick_seconds: i64,
    /// Per-tick return half-range.
    pub volatility: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            instrument: "GC".into(),
            seed: 7,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default(),
            days: 14,
            start_price: 2000.0,
            tick_seconds: 30,
            volatility: 0.0004,
        }
    }
}

/// Ticks per drift regime.
const REGIME_TICKS: usize = 720;

pub fn generate_ticks(config: &SyntheticConfig) -> Vec<PriceEvent> {
    // Deterministic seed from instrument and seed
    let seed_bytes = blake3::hash(format!("{}:{}", config.instrument, config.seed).as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

    let vol = config.volatility.max(1e-9);
    let step = Duration::seconds(config.tick_seconds.max(1));
    let per_day = (86_400 / step.num_seconds()) as usize;
    let mut ticks = Vec::with_capacity(per_day * config.days as usize);
    let mut price = config.start_price;
    let mut drift = 0.0;
    let mut n = 0usize;

    for offset in 0..config.days {
        let date = config.start_date + Duration::days(i64::from(offset));
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        let mut ts = Utc.from_utc_datetime(&midnight);
        for _ in 0..per_day {
            if n % REGIME_TICKS == 0 {
                drift = rng.gen_range(-0.6..0.6) * vol;
            }
            let ret: f64 = drift + rng.gen_range(-vol..vol);
            price = (price * (1.0 + ret)).max(0.1);
            let volume = f64::from(rng.gen_range(1..25u32));
            ticks.push(PriceEvent::new(ts, (price * 10.0).round() / 10.0, volume));
            ts += step;
            n += 1;
        }
    }
    ticks
}
