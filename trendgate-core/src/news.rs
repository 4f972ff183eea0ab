//! News blackout gate.
//!
//! The calendar itself is owned by an external collaborator; the engine only
//! sees a manual flag plus a list of `[start, end)` windows (NFP, CPI, FOMC...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub label: String,
}

impl BlackoutWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewsCalendar {
    manual: bool,
    windows: Vec<BlackoutWindow>,
}

impl NewsCalendar {
    pub fn new(mut windows: Vec<BlackoutWindow>) -> Self {
        windows.sort_by_key(|w| w.start);
        Self {
            manual: false,
            windows,
        }
    }

    /// Force the blackout on or off regardless of windows.
    pub fn set_manual(&mut self, active: bool) {
        self.manual = active;
    }

    pub fn add_window(&mut self, window: BlackoutWindow) {
        let idx = self.windows.partition_point(|w| w.start <= window.start);
        self.windows.insert(idx, window);
    }

    pub fn is_blackout(&self, ts: DateTime<Utc>) -> bool {
        self.manual || self.active_window(ts).is_some()
    }

    pub fn active_window(&self, ts: DateTime<Utc>) -> Option<&BlackoutWindow> {
        self.windows
            .iter()
            .take_while(|w| w.start <= ts)
            .find(|w| w.contains(ts))
    }

    pub fn windows(&self) -> &[BlackoutWindow] {
        &self.windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 8, h, m, 0).unwrap()
    }

    fn nfp() -> BlackoutWindow {
        BlackoutWindow {
            start: at(13, 15),
            end: at(14, 0),
            label: "NFP".into(),
        }
    }

    #[test]
    fn window_is_half_open() {
        let cal = NewsCalendar::new(vec![nfp()]);
        assert!(!cal.is_blackout(at(13, 10)));
        assert!(cal.is_blackout(at(13, 15)));
        assert!(cal.is_blackout(at(13, 55)));
        assert!(!cal.is_blackout(at(14, 0)));
        assert_eq!(cal.active_window(at(13, 30)).unwrap().label, "NFP");
    }

    #[test]
    fn manual_flag_overrides() {
        let mut cal = NewsCalendar::default();
        assert!(!cal.is_blackout(at(10, 0)));
        cal.set_manual(true);
        assert!(cal.is_blackout(at(10, 0)));
        cal.set_manual(false);
        assert!(!cal.is_blackout(at(10, 0)));
    }

    #[test]
    fn added_windows_stay_sorted() {
        let mut cal = NewsCalendar::new(vec![nfp()]);
        cal.add_window(BlackoutWindow {
            start: at(9, 0),
            end: at(9, 30),
            label: "CPI".into(),
        });
        assert_eq!(cal.windows()[0].label, "CPI");
        assert!(cal.is_blackout(at(9, 10)));
        assert!(cal.is_blackout(at(13, 20)));
    }
}
