//! Engine pipeline: aggregator → indicators → evaluator → position manager.
//!
//! Single-threaded and synchronous. Each market event is processed to
//! completion before the next one is admitted. Closed bars from one event are
//! all pushed through the indicator engine before the LTF decision runs, so a
//! HTF bar closing at the same instant is visible to that decision.
//!
//! Per LTF bar:
//! 1. advance the session clock to the bar's close (rollover resets daily counters)
//! 2. exit checks for the open position
//! 3. signal evaluation against the latest HTF snapshot, inside the session only
//! 4. entry through the risk guard

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::aggregator::BarAggregator;
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{
    Bar, ClosedTrade, ExitReason, MarketEvent, OrderIntent, Position, PriceEvent, Timeframe,
    TradeIntent,
};
use crate::error::EngineError;
use crate::indicators::{IndicatorEngine, IndicatorSnapshot};
use crate::news::NewsCalendar;
use crate::position::{PositionManager, PositionState, StateTransition};
use crate::risk::RiskGuard;
use crate::session::SessionClock;
use crate::signals::{SignalEvaluator, Verdict};

/// Observable output of one call into the engine, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    BarClosed(Bar),
    Intent(TradeIntent),
    Order(OrderIntent),
    Transition(StateTransition),
    /// A recoverable decision error (ambiguity, denial, late bar).
    Rejected(EngineError),
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    ltf: Timeframe,
    htf: Timeframe,
    aggregator: BarAggregator,
    indicators: IndicatorEngine,
    evaluator: SignalEvaluator,
    guard: RiskGuard,
    positions: PositionManager,
    clock: SessionClock,
    news: NewsCalendar,
    equity: Option<f64>,
    last_ltf_close: Option<f64>,
}

impl Engine {
    /// Validate `config` and build a fresh engine. This is the only fatal
    /// failure point.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = config.session.window()?;
        let ltf = config.timeframes.ltf;
        let htf = config.timeframes.htf;
        info!(
            instrument = %config.instrument,
            ltf = %ltf,
            htf = %htf,
            zone = %window.zone,
            "engine initialized"
        );
        Ok(Self {
            aggregator: BarAggregator::new(&config.timeframes.targets()),
            indicators: IndicatorEngine::new(
                config.indicators.clone(),
                config.risk.volume_lookback,
                window,
            ),
            evaluator: SignalEvaluator::from_config(&config.risk),
            guard: RiskGuard::new(config.risk.clone()),
            positions: PositionManager::new(config.risk.clone()),
            clock: SessionClock::new(window),
            news: NewsCalendar::default(),
            equity: None,
            last_ltf_close: None,
            ltf,
            htf,
            config,
        })
    }

    /// Replace the predicate chain.
    pub fn with_evaluator(mut self, evaluator: SignalEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn news(&self) -> &NewsCalendar {
        &self.news
    }

    pub fn news_mut(&mut self) -> &mut NewsCalendar {
        &mut self.news
    }

    /// Account equity used by the daily loss limit.
    pub fn set_equity(&mut self, equity: Option<f64>) {
        self.equity = equity;
    }

    pub fn state(&self) -> PositionState {
        self.positions.state()
    }

    pub fn position(&self) -> Option<&Position> {
        self.positions.position()
    }

    /// Round trips completed since the previous drain.
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        self.positions.closed_trades()
    }

    /// Take completed round trips; long-lived callers drain periodically.
    pub fn drain_closed_trades(&mut self) -> Vec<ClosedTrade> {
        self.positions.drain_closed_trades()
    }

    pub fn realized_pnl_today(&self) -> f64 {
        self.positions.realized_pnl_today()
    }

    pub fn snapshot(&self, timeframe: Timeframe) -> Option<&IndicatorSnapshot> {
        self.indicators.snapshot(timeframe)
    }

    /// Feed one market event.
    ///
    /// `Err` means the input itself was rejected (late, duplicate or
    /// malformed) and nothing changed. Decision errors are reported as
    /// [`EngineEvent::Rejected`] in the returned events.
    pub fn on_event(&mut self, event: &MarketEvent) -> Result<Vec<EngineEvent>, EngineError> {
        match event {
            MarketEvent::Tick(tick) => self.on_tick(tick),
            MarketEvent::Bar(bar) => self.on_bar(bar),
        }
    }

    pub fn on_tick(&mut self, tick: &PriceEvent) -> Result<Vec<EngineEvent>, EngineError> {
        let closed = self.aggregator.push_event(tick).map_err(|e| {
            warn!(kind = e.kind(), error = %e, "tick rejected");
            e
        })?;
        Ok(self.process_closed(closed))
    }

    /// Feed one pre-built bar of the source timeframe.
    pub fn on_bar(&mut self, bar: &Bar) -> Result<Vec<EngineEvent>, EngineError> {
        let closed = self.aggregator.push_bar(bar).map_err(|e| {
            warn!(kind = e.kind(), error = %e, "bar rejected");
            e
        })?;
        Ok(self.process_closed(closed))
    }

    /// End of data: close any open position at the last LTF close.
    pub fn finish(&mut self, timestamp: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        if let Some(price) = self.last_ltf_close {
            if let Some(order) = self
                .positions
                .force_close(price, timestamp, ExitReason::EndOfData)
            {
                out.push(EngineEvent::Order(order));
            }
        }
        self.drain_transitions(&mut out);
        out
    }

    /// Back to the freshly constructed state. The news calendar, equity and
    /// predicate chain are inputs and are kept.
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.indicators.reset();
        self.positions.reset();
        self.clock = SessionClock::new(*self.clock.window());
        self.last_ltf_close = None;
    }

    fn process_closed(&mut self, closed: Vec<Bar>) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        let mut ltf_bars = Vec::new();
        for bar in closed {
            match self.indicators.update(&bar) {
                Ok(snap) => {
                    if bar.timeframe == self.ltf {
                        ltf_bars.push((bar.clone(), snap));
                    }
                    out.push(EngineEvent::BarClosed(bar));
                }
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "closed bar rejected");
                    out.push(EngineEvent::Rejected(e));
                }
            }
        }
        for (bar, snap) in ltf_bars {
            self.on_ltf_bar(&bar, &snap, &mut out);
        }
        out
    }

    fn on_ltf_bar(&mut self, bar: &Bar, ltf: &IndicatorSnapshot, out: &mut Vec<EngineEvent>) {
        let now = bar.close_time();
        if self.clock.advance(now) {
            self.positions.reset_daily();
            info!(
                trading_day = ?self.clock.trading_day(),
                timestamp = %now,
                "session rollover"
            );
        }
        self.last_ltf_close = Some(bar.close);

        if let Some(order) = self.positions.on_bar(bar, ltf, &self.clock) {
            out.push(EngineEvent::Order(order));
        }
        self.drain_transitions(out);

        if !self.clock.is_open() {
            debug!(timestamp = %now, "outside session, not evaluating");
            return;
        }
        let Some(htf) = self.indicators.snapshot(self.htf) else {
            debug!(timestamp = %now, "no {} bar yet", self.htf);
            return;
        };
        let blackout = self.news.is_blackout(now);
        match self.evaluator.assess(htf, ltf, bar, blackout) {
            Ok(Verdict::Enter(intent)) => {
                debug!(side = %intent.side, timestamp = %now, "entry signal");
                out.push(EngineEvent::Intent(intent.clone()));
                match self.positions.on_intent(
                    &intent,
                    bar,
                    ltf,
                    htf,
                    &self.guard,
                    &self.clock,
                    self.equity,
                ) {
                    Ok(Some(order)) => out.push(EngineEvent::Order(order)),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(kind = e.kind(), error = %e, "entry rejected");
                        out.push(EngineEvent::Rejected(e));
                    }
                }
                self.drain_transitions(out);
            }
            Ok(verdict) => {
                debug!(verdict = verdict.label(), timestamp = %now, "no entry");
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "signal rejected");
                out.push(EngineEvent::Rejected(e));
            }
        }
    }

    fn drain_transitions(&mut self, out: &mut Vec<EngineEvent>) {
        out.extend(
            self.positions
                .drain_transitions()
                .into_iter()
                .map(EngineEvent::Transition),
        );
    }
}
