//! Session window and the per-pipeline session clock.
//!
//! The clock is a plain value owned by the engine and passed by reference into
//! every bar-processing call. It is advanced to each LTF bar's close instant;
//! a change of trading day is a session rollover.
//!
//! A trading day starts at `session_start` local time and runs until the next
//! day's `session_start`, so overnight prints belong to the preceding session.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Resolved session parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub zone: Tz,
}

impl SessionWindow {
    pub fn local_time(&self, ts: DateTime<Utc>) -> NaiveTime {
        ts.with_timezone(&self.zone).time()
    }

    /// True when `start <= local time < end`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let t = self.local_time(ts);
        t >= self.start && t < self.end
    }

    /// Trading day that `ts` belongs to.
    pub fn trading_day(&self, ts: DateTime<Utc>) -> NaiveDate {
        let local = ts.with_timezone(&self.zone);
        if local.time() >= self.start {
            local.date_naive()
        } else {
            local.date_naive().pred_opt().unwrap_or(local.date_naive())
        }
    }

    /// UTC instant of the session start on `day`.
    pub fn session_start(&self, day: NaiveDate) -> DateTime<Utc> {
        self.resolve(day.and_time(self.start))
    }

    /// UTC instant of the session end on `day`.
    pub fn session_end(&self, day: NaiveDate) -> DateTime<Utc> {
        self.resolve(day.and_time(self.end))
    }

    // Wall times skipped by a spring-forward transition resolve one hour later.
    fn resolve(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        use chrono::offset::LocalResult;
        match self.zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                let shifted = naive + Duration::hours(1);
                self.zone
                    .from_local_datetime(&shifted)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
            }
        }
    }
}

/// Where the clock sits relative to the session window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Before the first advance.
    Unset,
    /// Inside `[start, end)`.
    Open,
    /// At or after `end`, before the next day's start.
    Closed,
}

/// Session clock for one pipeline.
#[derive(Debug, Clone)]
pub struct SessionClock {
    window: SessionWindow,
    now: Option<DateTime<Utc>>,
    trading_day: Option<NaiveDate>,
}

impl SessionClock {
    pub fn new(window: SessionWindow) -> Self {
        Self {
            window,
            now: None,
            trading_day: None,
        }
    }

    pub fn window(&self) -> &SessionWindow {
        &self.window
    }

    /// Move the clock forward. Returns `true` on a trading-day rollover,
    /// including the first advance.
    pub fn advance(&mut self, ts: DateTime<Utc>) -> bool {
        let day = self.window.trading_day(ts);
        self.now = Some(ts);
        let rolled = self.trading_day != Some(day);
        self.trading_day = Some(day);
        rolled
    }

    pub fn now(&self) -> Option<DateTime<Utc>> {
        self.now
    }

    pub fn trading_day(&self) -> Option<NaiveDate> {
        self.trading_day
    }

    pub fn phase(&self) -> SessionPhase {
        match self.now {
            None => SessionPhase::Unset,
            Some(ts) if self.window.contains(ts) => SessionPhase::Open,
            Some(_) => SessionPhase::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase() == SessionPhase::Open
    }

    /// True once the clock reads the session end of the current trading day
    /// or later.
    pub fn is_past_close(&self) -> bool {
        match (self.now, self.trading_day) {
            (Some(now), Some(day)) => now >= self.window.session_end(day),
            _ => false,
        }
    }

    /// End of the current trading day's session.
    pub fn session_end(&self) -> Option<DateTime<Utc>> {
        self.trading_day.map(|day| self.window.session_end(day))
    }

    /// Minutes since local midnight, for log fields.
    pub fn local_minutes(&self) -> Option<u32> {
        self.now.map(|ts| {
            let t = self.window.local_time(ts);
            t.hour() * 60 + t.minute()
        })
    }
}
