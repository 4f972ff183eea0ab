//! Position manager state machine.
//!
//! ```text
//! FLAT --accepted intent--> OPEN_LONG | OPEN_SHORT --exit trigger--> CLOSING --> FLAT
//! ```
//!
//! Exit triggers on each LTF bar close, first match wins:
//! 1. stop touched by the bar range (fill at stop), then target (fill at target)
//! 2. LTF MACD histogram against the position (fill at close)
//! 3. close across the fast EMA against the position (fill at close)
//! 4. session close or the deadline fixed at entry (fill at close)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

use crate::config::RiskConfig;
use crate::domain::{
    Bar, Bracket, ClosedTrade, ExitReason, OrderAction, OrderIntent, Position, PositionStatus,
    Side, TradeIntent,
};
use crate::error::EngineError;
use crate::indicators::{IndicatorKey, IndicatorSnapshot};
use crate::risk::{AccountState, EntryProposal, RiskGuard};
use crate::session::SessionClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Flat,
    OpenLong,
    OpenShort,
    Closing,
}

impl PositionState {
    pub fn open(side: Side) -> Self {
        match side {
            Side::Long => PositionState::OpenLong,
            Side::Short => PositionState::OpenShort,
        }
    }

    pub fn is_flat(self) -> bool {
        self == PositionState::Flat
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionState::Flat => "FLAT",
            PositionState::OpenLong => "OPEN_LONG",
            PositionState::OpenShort => "OPEN_SHORT",
            PositionState::Closing => "CLOSING",
        };
        f.write_str(s)
    }
}

/// What moved the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum TransitionCause {
    Entry(Side),
    Exit(ExitReason),
    /// CLOSING → FLAT after the exit order went out.
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: PositionState,
    pub to: PositionState,
    pub cause: TransitionCause,
    pub timestamp: DateTime<Utc>,
}

/// Owns the single position.
///
/// # Invariant
/// `position.is_some()` iff `state != Flat`. Stop and target are written once,
/// on entry.
#[derive(Debug, Clone)]
pub struct PositionManager {
    config: RiskConfig,
    state: PositionState,
    position: Option<Position>,
    /// Forced-close instant fixed at entry.
    deadline: Option<DateTime<Utc>>,
    /// Close time of the bar that last exited; blocks re-entry on that bar.
    last_exit: Option<DateTime<Utc>>,
    pending: Vec<StateTransition>,
    /// Undrained round trips.
    closed: Vec<ClosedTrade>,
    realized_pnl_today: f64,
}

impl PositionManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            state: PositionState::Flat,
            position: None,
            deadline: None,
            last_exit: None,
            pending: Vec::new(),
            closed: Vec::new(),
            realized_pnl_today: 0.0,
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Round trips completed since the previous drain.
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    /// Hand over completed round trips, oldest first.
    pub fn drain_closed_trades(&mut self) -> Vec<ClosedTrade> {
        std::mem::take(&mut self.closed)
    }

    /// Realized P&L since the last rollover, in currency.
    pub fn realized_pnl_today(&self) -> f64 {
        self.realized_pnl_today
    }

    /// Transitions recorded since the previous drain, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<StateTransition> {
        std::mem::take(&mut self.pending)
    }

    pub fn reset_daily(&mut self) {
        self.realized_pnl_today = 0.0;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn account_state(&self, clock: &SessionClock, equity: Option<f64>) -> AccountState {
        AccountState {
            position_open: !self.state.is_flat(),
            session_open: clock.is_open(),
            equity,
            realized_pnl_today: self.realized_pnl_today,
        }
    }

    /// Apply an entry intent at the close of `entry_bar`.
    ///
    /// Returns `Ok(None)` when the intent is discarded because a position is
    /// already open or the bar just closed one.
    pub fn on_intent(
        &mut self,
        intent: &TradeIntent,
        entry_bar: &Bar,
        ltf: &IndicatorSnapshot,
        htf: &IndicatorSnapshot,
        guard: &RiskGuard,
        clock: &SessionClock,
        equity: Option<f64>,
    ) -> Result<Option<OrderIntent>, EngineError> {
        if !self.state.is_flat() {
            info!(
                side = %intent.side,
                state = %self.state,
                timestamp = %intent.timestamp,
                "entry intent ignored, not flat"
            );
            return Ok(None);
        }
        if self.last_exit == Some(intent.timestamp) {
            info!(
                side = %intent.side,
                timestamp = %intent.timestamp,
                "entry intent ignored, position closed on this bar"
            );
            return Ok(None);
        }

        let entry_price = entry_bar.close;
        let bracket = Bracket::compute(
            intent.side,
            entry_price,
            self.config.max_loss_pct,
            self.config.reward_multiple,
        );
        let proposal = EntryProposal {
            side: intent.side,
            entry_price,
            bracket,
            contract_count: self.config.contracts_per_trade,
            timestamp: intent.timestamp,
            ltf,
            htf,
        };
        let account = self.account_state(clock, equity);
        guard
            .check(&proposal, &account)
            .map_err(|denial| EngineError::AuthorizationDenied {
                timestamp: intent.timestamp,
                denial,
            })?;

        let position = Position {
            side: intent.side,
            entry_price,
            stop_price: bracket.stop_price,
            target_price: bracket.target_price,
            contract_count: proposal.contract_count,
            entry_time: intent.timestamp,
            status: PositionStatus::Open,
        };
        let order = OrderIntent {
            action: OrderAction::Enter,
            side: position.side,
            contract_count: position.contract_count,
            price: entry_price,
            stop_price: position.stop_price,
            target_price: position.target_price,
            reasons: intent.reasons.clone(),
            exit_reason: None,
            timestamp: intent.timestamp,
        };
        info!(
            side = %position.side,
            entry = position.entry_price,
            stop = position.stop_price,
            target = position.target_price,
            timestamp = %intent.timestamp,
            "position opened"
        );

        self.deadline = clock.session_end();
        self.position = Some(position);
        self.transition(
            PositionState::open(intent.side),
            TransitionCause::Entry(intent.side),
            intent.timestamp,
        );
        Ok(Some(order))
    }

    /// Check exit triggers against a closed LTF bar. The clock must already
    /// read the bar's close time.
    pub fn on_bar(
        &mut self,
        bar: &Bar,
        ltf: &IndicatorSnapshot,
        clock: &SessionClock,
    ) -> Option<OrderIntent> {
        let position = self.position.as_ref()?;
        let (reason, price) = self.exit_trigger(position, bar, ltf, clock)?;
        self.close(reason, price, bar.close_time())
    }

    /// Close unconditionally, e.g. at end of data.
    pub fn force_close(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<OrderIntent> {
        self.close(reason, price, timestamp)
    }

    fn exit_trigger(
        &self,
        position: &Position,
        bar: &Bar,
        ltf: &IndicatorSnapshot,
        clock: &SessionClock,
    ) -> Option<(ExitReason, f64)> {
        if position.stop_touched(bar.high, bar.low) {
            return Some((ExitReason::Stop, position.stop_price));
        }
        if position.target_touched(bar.high, bar.low) {
            return Some((ExitReason::Target, position.target_price));
        }

        let against = |a: f64, b: f64| match position.side {
            Side::Long => a < b,
            Side::Short => a > b,
        };
        if ltf
            .get(IndicatorKey::MacdHist)
            .is_some_and(|hist| against(hist, 0.0))
        {
            return Some((ExitReason::MacdFlip, bar.close));
        }
        if ltf
            .get(IndicatorKey::EmaFast)
            .is_some_and(|ema| against(bar.close, ema))
        {
            return Some((ExitReason::Ema9Break, bar.close));
        }

        let past_deadline = match (clock.now(), self.deadline) {
            (Some(now), Some(deadline)) => now >= deadline,
            _ => false,
        };
        if clock.is_past_close() || past_deadline {
            return Some((ExitReason::SessionClose, bar.close));
        }
        None
    }

    fn close(
        &mut self,
        reason: ExitReason,
        exit_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<OrderIntent> {
        let position = self.position.as_mut()?;
        position.status = PositionStatus::Closing;
        self.transition(PositionState::Closing, TransitionCause::Exit(reason), timestamp);
        let position = self.position.take()?;

        let trade = ClosedTrade {
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            stop_price: position.stop_price,
            target_price: position.target_price,
            contract_count: position.contract_count,
            entry_time: position.entry_time,
            exit_time: timestamp,
            exit_reason: reason,
        };
        let pnl_points = trade.pnl_points();
        self.realized_pnl_today += pnl_points * self.config.point_value;
        info!(
            side = %trade.side,
            exit = exit_price,
            reason = %reason,
            pnl_points,
            timestamp = %timestamp,
            "position closed"
        );
        self.closed.push(trade);

        let order = OrderIntent {
            action: OrderAction::Exit,
            side: position.side,
            contract_count: position.contract_count,
            price: exit_price,
            stop_price: position.stop_price,
            target_price: position.target_price,
            reasons: BTreeSet::new(),
            exit_reason: Some(reason),
            timestamp,
        };

        self.deadline = None;
        self.last_exit = Some(timestamp);
        self.transition(PositionState::Flat, TransitionCause::Settled, timestamp);
        Some(order)
    }

    fn transition(&mut self, to: PositionState, cause: TransitionCause, timestamp: DateTime<Utc>) {
        debug_assert_eq!(
            self.position.is_some(),
            !to.is_flat(),
            "{} -> {to} with position {:?}",
            self.state,
            self.position
        );
        self.pending.push(StateTransition {
            from: self.state,
            to,
            cause,
            timestamp,
        });
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReasonTag, Timeframe};
    use crate::risk::Denial;
    use crate::session::SessionWindow;
    use chrono::{NaiveTime, TimeZone};

    fn window() -> SessionWindow {
        SessionWindow {
            start: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            zone: chrono_tz::America::New_York,
        }
    }

    // 2024-03-15 is EDT (UTC-4).
    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn bar_closing_at(close_time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timeframe: Timeframe::M5,
            open_time: close_time - Timeframe::M5.duration(),
            open,
            high,
            low,
            close,
            volume: 1500.0,
        }
    }

    fn snapshot(bar: &Bar) -> IndicatorSnapshot {
        IndicatorSnapshot::new(bar.clone(), 100)
            .with(IndicatorKey::EmaFast, 2041.0)
            .with(IndicatorKey::EmaMid, 2038.0)
            .with(IndicatorKey::EmaSlow, 2030.0)
            .with(IndicatorKey::Vwap, 2040.0)
            .with(IndicatorKey::VolumeSma, 1200.0)
            .with(IndicatorKey::MacdHist, 0.5)
    }

    fn htf_snapshot() -> IndicatorSnapshot {
        let bar = Bar {
            timeframe: Timeframe::H1,
            open_time: utc(13, 0),
            open: 2020.0,
            high: 2045.0,
            low: 2018.0,
            close: 2040.0,
            volume: 9000.0,
        };
        IndicatorSnapshot::new(bar, 250)
            .with(IndicatorKey::EmaTrend, 1990.0)
            .with(IndicatorKey::MacdHist, 0.8)
            .with(IndicatorKey::Adx, 27.0)
    }

    /// LTF snapshot with the histogram leaning short.
    fn short_snapshot(bar: &Bar) -> IndicatorSnapshot {
        snapshot(bar).with(IndicatorKey::MacdHist, -0.5)
    }

    fn clock_at(ts: DateTime<Utc>) -> SessionClock {
        let mut clock = SessionClock::new(window());
        clock.advance(ts);
        clock
    }

    fn open_long(pm: &mut PositionManager) -> OrderIntent {
        let ts = utc(14, 35);
        let bar = bar_closing_at(ts, 2039.0, 2043.0, 2038.0, 2042.0);
        let intent = TradeIntent::new(Side::Long, ts).with_reasons([ReasonTag::HtfTrend]);
        let guard = RiskGuard::new(RiskConfig::default());
        let snap = snapshot(&bar);
        pm.on_intent(&intent, &bar, &snap, &htf_snapshot(), &guard, &clock_at(ts), None)
            .unwrap()
            .unwrap()
    }

    /// Short at 2042: stop 2348.3, target 1123.1.
    fn open_short(pm: &mut PositionManager) -> OrderIntent {
        let ts = utc(14, 35);
        let bar = bar_closing_at(ts, 2045.0, 2046.0, 2041.0, 2042.0);
        let intent = TradeIntent::new(Side::Short, ts);
        let guard = RiskGuard::new(RiskConfig::default());
        let snap = short_snapshot(&bar);
        pm.on_intent(&intent, &bar, &snap, &htf_snapshot(), &guard, &clock_at(ts), None)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn entry_sets_bracket_and_state() {
        let mut pm = PositionManager::new(RiskConfig::default());
        let order = open_long(&mut pm);
        assert!(order.is_entry());
        assert_eq!(pm.state(), PositionState::OpenLong);
        let pos = pm.position().unwrap();
        assert!((pos.stop_price - 1735.7).abs() < 1e-9);
        assert!((pos.target_price - 2960.9).abs() < 1e-9);
        assert_eq!(pm.deadline(), Some(utc(20, 0)));
        let transitions = pm.drain_transitions();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from, PositionState::Flat);
        assert_eq!(transitions[0].cause, TransitionCause::Entry(Side::Long));
    }

    #[test]
    fn second_intent_is_ignored_while_open() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2045.0, 2041.0, 2044.0);
        let intent = TradeIntent::new(Side::Short, ts);
        let guard = RiskGuard::new(RiskConfig::default());
        let out = pm
            .on_intent(
                &intent,
                &bar,
                &snapshot(&bar),
                &htf_snapshot(),
                &guard,
                &clock_at(ts),
                None,
            )
            .unwrap();
        assert!(out.is_none());
        assert_eq!(pm.state(), PositionState::OpenLong);
    }

    #[test]
    fn denial_leaves_manager_flat() {
        let mut pm = PositionManager::new(RiskConfig::default());
        // 07:00 local, before the session opens
        let ts = utc(11, 0);
        let bar = bar_closing_at(ts, 2039.0, 2043.0, 2038.0, 2042.0);
        let intent = TradeIntent::new(Side::Long, ts);
        let guard = RiskGuard::new(RiskConfig::default());
        let err = pm
            .on_intent(
                &intent,
                &bar,
                &snapshot(&bar),
                &htf_snapshot(),
                &guard,
                &clock_at(ts),
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "authorization_denied");
        assert_eq!(pm.state(), PositionState::Flat);
        assert!(pm.position().is_none());
    }

    #[test]
    fn missing_htf_value_denies_entry() {
        let mut pm = PositionManager::new(RiskConfig::default());
        let ts = utc(14, 35);
        let bar = bar_closing_at(ts, 2039.0, 2043.0, 2038.0, 2042.0);
        let full = htf_snapshot();
        let no_adx = IndicatorSnapshot::new(full.bar.clone(), full.bars_seen)
            .with(IndicatorKey::EmaTrend, 1990.0)
            .with(IndicatorKey::MacdHist, 0.8);
        let intent = TradeIntent::new(Side::Long, ts);
        let guard = RiskGuard::new(RiskConfig::default());
        let snap = snapshot(&bar);
        let err = pm
            .on_intent(&intent, &bar, &snap, &no_adx, &guard, &clock_at(ts), None)
            .unwrap_err();
        match err {
            EngineError::AuthorizationDenied { denial, .. } => {
                assert_eq!(denial, Denial::MissingSnapshotValue(IndicatorKey::Adx));
            }
            other => panic!("expected denial, got {other:?}"),
        }
        assert_eq!(pm.state(), PositionState::Flat);
        assert!(pm.drain_transitions().is_empty());
    }

    #[test]
    fn stop_wins_over_target_on_wide_bar() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        pm.drain_transitions();
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 3000.0, 1700.0, 2045.0);
        let order = pm.on_bar(&bar, &snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::Stop));
        assert!((order.price - 1735.7).abs() < 1e-9);
        assert_eq!(pm.state(), PositionState::Flat);

        let states: Vec<_> = pm.drain_transitions().iter().map(|t| t.to).collect();
        assert_eq!(states, vec![PositionState::Closing, PositionState::Flat]);
    }

    #[test]
    fn macd_flip_precedes_ema_break() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2043.0, 2035.0, 2036.0);
        let snap = snapshot(&bar).with(IndicatorKey::MacdHist, -0.3);
        let order = pm.on_bar(&bar, &snap, &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::MacdFlip));
        assert_eq!(order.price, 2036.0);
    }

    #[test]
    fn close_below_fast_ema_exits_long() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2043.0, 2039.0, 2040.0);
        let order = pm.on_bar(&bar, &snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::Ema9Break));
    }

    #[test]
    fn long_target_fills_at_target() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2970.0, 2040.0, 2965.0);
        let order = pm.on_bar(&bar, &snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::Target));
        assert!((order.price - 2960.9).abs() < 1e-9);
        let trade = &pm.closed_trades()[0];
        assert!((trade.pnl_points() - 918.9).abs() < 1e-9);
    }

    // ── Short side ──────────────────────────────────────────────────

    #[test]
    fn short_entry_mirrors_bracket() {
        let mut pm = PositionManager::new(RiskConfig::default());
        let order = open_short(&mut pm);
        assert_eq!(order.side, Side::Short);
        assert_eq!(pm.state(), PositionState::OpenShort);
        let pos = pm.position().unwrap();
        assert!((pos.stop_price - 2348.3).abs() < 1e-9);
        assert!((pos.target_price - 1123.1).abs() < 1e-9);
    }

    #[test]
    fn short_target_fills_at_target() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_short(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 1200.0, 1210.0, 1100.0, 1150.0);
        let order = pm.on_bar(&bar, &short_snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::Target));
        assert!((order.price - 1123.1).abs() < 1e-9);
        let trade = &pm.closed_trades()[0];
        assert!((trade.pnl_points() - 918.9).abs() < 1e-9);
    }

    #[test]
    fn short_stop_fills_at_stop() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_short(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2400.0, 2040.0, 2350.0);
        let order = pm.on_bar(&bar, &short_snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::Stop));
        assert!((order.price - 2348.3).abs() < 1e-9);
        assert!(pm.closed_trades()[0].pnl_points() < 0.0);
    }

    #[test]
    fn short_macd_flip_exits() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_short(&mut pm);
        let ts = utc(14, 40);
        // close stays under the fast EMA, only the histogram turned
        let bar = bar_closing_at(ts, 2042.0, 2043.0, 2036.0, 2038.0);
        let snap = short_snapshot(&bar).with(IndicatorKey::MacdHist, 0.3);
        let order = pm.on_bar(&bar, &snap, &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::MacdFlip));
        assert_eq!(order.price, 2038.0);
    }

    #[test]
    fn short_close_above_fast_ema_exits() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_short(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2045.0, 2041.0, 2044.0);
        let order = pm.on_bar(&bar, &short_snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::Ema9Break));
        assert_eq!(order.price, 2044.0);
    }

    #[test]
    fn short_holds_below_fast_ema() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_short(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2042.5, 2036.0, 2037.0);
        assert!(pm.on_bar(&bar, &short_snapshot(&bar), &clock_at(ts)).is_none());
        assert_eq!(pm.state(), PositionState::OpenShort);
    }

    #[test]
    fn exit_passes_through_closing_with_position_held() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_short(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2045.0, 2041.0, 2044.0);
        pm.on_bar(&bar, &short_snapshot(&bar), &clock_at(ts)).unwrap();

        // transition() asserts the position is held in every non-flat state
        let path: Vec<_> = pm
            .drain_transitions()
            .iter()
            .map(|t| (t.from, t.to))
            .collect();
        assert_eq!(
            path,
            vec![
                (PositionState::Flat, PositionState::OpenShort),
                (PositionState::OpenShort, PositionState::Closing),
                (PositionState::Closing, PositionState::Flat),
            ]
        );
        assert!(pm.position().is_none());
    }

    // ── Bookkeeping ─────────────────────────────────────────────────

    #[test]
    fn closed_trades_drain_once() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        pm.force_close(2040.0, utc(14, 50), ExitReason::EndOfData);
        let trades = pm.drain_closed_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::EndOfData);
        assert!(pm.closed_trades().is_empty());
        assert!(pm.drain_closed_trades().is_empty());
        // realized P&L outlives the drain
        assert!((pm.realized_pnl_today() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn holds_when_nothing_triggers() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2046.0, 2041.5, 2045.0);
        assert!(pm.on_bar(&bar, &snapshot(&bar), &clock_at(ts)).is_none());
        assert_eq!(pm.state(), PositionState::OpenLong);
    }

    #[test]
    fn session_end_forces_close() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        // bar closing at 16:00 local
        let ts = utc(20, 0);
        let bar = bar_closing_at(ts, 2044.0, 2046.0, 2043.0, 2045.0);
        let order = pm.on_bar(&bar, &snapshot(&bar), &clock_at(ts)).unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::SessionClose));
        assert_eq!(order.price, 2045.0);
        let trade = &pm.closed_trades()[0];
        assert!((trade.pnl_points() - 3.0).abs() < 1e-9);
        assert!((pm.realized_pnl_today() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn no_reentry_on_exit_bar() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        let ts = utc(14, 40);
        let bar = bar_closing_at(ts, 2042.0, 2043.0, 2039.0, 2040.0);
        pm.on_bar(&bar, &snapshot(&bar), &clock_at(ts)).unwrap();

        let intent = TradeIntent::new(Side::Short, ts);
        let guard = RiskGuard::new(RiskConfig::default());
        let out = pm
            .on_intent(
                &intent,
                &bar,
                &snapshot(&bar),
                &htf_snapshot(),
                &guard,
                &clock_at(ts),
                None,
            )
            .unwrap();
        assert!(out.is_none());
        assert_eq!(pm.state(), PositionState::Flat);
    }

    #[test]
    fn force_close_records_end_of_data() {
        let mut pm = PositionManager::new(RiskConfig::default());
        assert!(pm.force_close(2000.0, utc(15, 0), ExitReason::EndOfData).is_none());
        open_long(&mut pm);
        let order = pm
            .force_close(2040.0, utc(15, 0), ExitReason::EndOfData)
            .unwrap();
        assert_eq!(order.exit_reason, Some(ExitReason::EndOfData));
        assert_eq!(pm.closed_trades().len(), 1);
        assert!(pm.position().is_none());
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut pm = PositionManager::new(RiskConfig::default());
        open_long(&mut pm);
        pm.reset();
        assert_eq!(pm.state(), PositionState::Flat);
        assert!(pm.drain_transitions().is_empty());
        assert!(pm.closed_trades().is_empty());
    }
}
