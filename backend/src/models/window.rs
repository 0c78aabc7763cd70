use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::TwilightPhase;

/// One night's capture interval, `[start, end)`, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub phase: TwilightPhase,
}

impl ImagingWindow {
    /// Builds a window, discarding fractional seconds from both bounds.
    ///
    /// Returns `None` if the truncated bounds do not satisfy `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, phase: TwilightPhase) -> Option<Self> {
        let start = truncate_to_second(start);
        let end = truncate_to_second(end);
        (start < end).then_some(Self { start, end, phase })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Calendar date tag (`YYYYMMDD`) of the window start in `tz`.
    pub fn date_tag<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        self.start.with_timezone(tz).format("%Y%m%d").to_string()
    }
}

/// Why a phase produced no window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreachable {
    /// The sun stays above the threshold for the whole search span.
    AlwaysAbove,
    /// A crossing exists but its counterpart could not be found.
    Incomplete,
}

pub fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(Duration::seconds(1))
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    #[test]
    fn test_new_truncates_subseconds() {
        let start = Utc.with_ymd_and_hms(2024, 6, 21, 21, 0, 0).unwrap()
            + Duration::milliseconds(987);
        let end = Utc.with_ymd_and_hms(2024, 6, 22, 2, 0, 0).unwrap() + Duration::milliseconds(5);
        let window = ImagingWindow::new(start, end, TwilightPhase::Nautical).unwrap();
        assert_eq!(window.start.nanosecond(), 0);
        assert_eq!(window.end.nanosecond(), 0);
        assert_eq!(window.duration(), Duration::hours(5));
    }

    #[test]
    fn test_new_rejects_empty_window() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(ImagingWindow::new(t, t + Duration::milliseconds(400), TwilightPhase::Sunset).is_none());
        assert!(ImagingWindow::new(t, t - Duration::hours(1), TwilightPhase::Sunset).is_none());
    }

    #[test]
    fn test_date_tag_uses_local_calendar() {
        let start = Utc.with_ymd_and_hms(2024, 6, 21, 23, 30, 0).unwrap();
        let window =
            ImagingWindow::new(start, start + Duration::hours(3), TwilightPhase::Civil).unwrap();
        assert_eq!(window.date_tag(&Utc), "20240621");
        assert_eq!(window.date_tag(&chrono_tz::Europe::Berlin), "20240622");
    }
}
