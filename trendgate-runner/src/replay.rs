//! Historical replay: feed a recorded market stream through the engine and
//! collect everything it emits.
//!
//! Replays are deterministic. The report carries a blake3 fingerprint over the
//! serialized intents, orders and transitions, so two runs over the same input
//! and config can be compared by a single string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trendgate_core::domain::{ClosedTrade, MarketEvent, OrderIntent, Timeframe, TradeIntent};
use trendgate_core::position::StateTransition;
use trendgate_core::{Engine, EngineEvent};

use crate::config::RunConfig;
use crate::error::RunnerError;
use crate::export::write_trades_file;
use crate::feed::load_feed;
use crate::sink::{JsonlSink, NullSink, OrderSink};
use crate::summary::TradeSummary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub events: usize,
    pub bars_closed: BTreeMap<Timeframe, usize>,
    pub intents: Vec<TradeIntent>,
    pub orders: Vec<OrderIntent>,
    pub transitions: Vec<StateTransition>,
    /// Input events the engine refused (late, duplicate, malformed).
    pub rejected_inputs: usize,
    /// Decision errors by kind (ambiguity, denials, warm-up).
    pub decision_errors: BTreeMap<String, usize>,
    pub closed_trades: Vec<ClosedTrade>,
    pub summary: TradeSummary,
    pub fingerprint: String,
}

/// Push `events` through `engine` in order, then close out at the end of the
/// last event. Every order intent goes to `sink`. Closed trades are drained
/// from the engine as they complete.
pub fn replay(
    engine: &mut Engine,
    events: &[MarketEvent],
    sink: &mut dyn OrderSink,
) -> Result<ReplayReport, RunnerError> {
    let mut report = ReplayReport::default();
    for event in events {
        report.events += 1;
        match engine.on_event(event) {
            Ok(emitted) => collect(&mut report, emitted, sink)?,
            Err(_) => report.rejected_inputs += 1,
        }
        report.closed_trades.extend(engine.drain_closed_trades());
    }
    if let Some(last) = events.last() {
        let end = match last {
            MarketEvent::Tick(t) => t.timestamp,
            MarketEvent::Bar(b) => b.close_time(),
        };
        let emitted = engine.finish(end);
        collect(&mut report, emitted, sink)?;
        report.closed_trades.extend(engine.drain_closed_trades());
    }
    sink.flush()?;

    report.summary =
        TradeSummary::compute(&report.closed_trades, engine.config().risk.point_value);
    report.fingerprint = fingerprint(&report)?;

    if report.rejected_inputs > 0 {
        warn!(rejected = report.rejected_inputs, "input events rejected");
    }
    info!(
        events = report.events,
        intents = report.intents.len(),
        orders = report.orders.len(),
        trades = report.summary.trades,
        net_points = report.summary.net_points,
        fingerprint = %report.fingerprint,
        "replay complete"
    );
    Ok(report)
}

fn collect(
    report: &mut ReplayReport,
    emitted: Vec<EngineEvent>,
    sink: &mut dyn OrderSink,
) -> Result<(), RunnerError> {
    for event in emitted {
        match event {
            EngineEvent::BarClosed(bar) => {
                *report.bars_closed.entry(bar.timeframe).or_insert(0) += 1;
            }
            EngineEvent::Intent(intent) => report.intents.push(intent),
            EngineEvent::Order(order) => {
                sink.submit(&order)?;
                report.orders.push(order);
            }
            EngineEvent::Transition(t) => report.transitions.push(t),
            EngineEvent::Rejected(e) => {
                *report.decision_errors.entry(e.kind().to_string()).or_insert(0) += 1;
            }
        }
    }
    Ok(())
}

/// blake3 over the JSON of every intent, order and transition, one per line.
pub fn fingerprint(report: &ReplayReport) -> Result<String, RunnerError> {
    let mut hasher = blake3::Hasher::new();
    for intent in &report.intents {
        hasher.update(&serde_json::to_vec(intent)?);
        hasher.update(b"\n");
    }
    for order in &report.orders {
        hasher.update(&serde_json::to_vec(order)?);
        hasher.update(b"\n");
    }
    for t in &report.transitions {
        hasher.update(&serde_json::to_vec(t)?);
        hasher.update(b"\n");
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Load the feed, build the engine and replay it as configured.
pub fn run(config: &RunConfig) -> Result<ReplayReport, RunnerError> {
    let zone = config.feed_zone()?;
    let events = load_feed(&config.feed, zone)?;

    let mut engine = Engine::new(config.engine.clone())?;
    *engine.news_mut() = config.news.calendar();
    engine.set_equity(Some(config.account.equity));

    let mut sink: Box<dyn OrderSink> = match &config.output.intents {
        Some(path) => {
            info!(path = %path.display(), "writing order intents");
            Box::new(JsonlSink::create(path)?)
        }
        None => Box::new(NullSink),
    };
    let report = replay(&mut engine, &events, sink.as_mut())?;

    if let Some(path) = &config.output.trades {
        write_trades_file(path, &report.closed_trades, config.engine.risk.point_value)?;
        info!(
            path = %path.display(),
            trades = report.closed_trades.len(),
            "trade tape written"
        );
    }
    Ok(report)
}
