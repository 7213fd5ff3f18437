//! Exchange session window and per-session data.
//!
//! Session bounds are configured as exchange-local wall-clock times and
//! re-derived to UTC for each calendar date, so a daylight-saving change
//! moves the UTC offset but never the session itself.

use super::annotate::AnnotatedBar;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session produced no scan. Not an error: the run carries on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    NoCoarseData,
    NoFineData,
    ReadFailure(String),
    TimeConversion,
    LateOpen,
    TooFewCoarseBars,
    TooFewFineBars,
    NoRange,
}

impl SkipReason {
    /// Stable key used in diagnostics tallies.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NoCoarseData => "no_coarse_data",
            SkipReason::NoFineData => "no_fine_data",
            SkipReason::ReadFailure(_) => "read_failure",
            SkipReason::TimeConversion => "time_conversion",
            SkipReason::LateOpen => "late_open",
            SkipReason::TooFewCoarseBars => "too_few_coarse_bars",
            SkipReason::TooFewFineBars => "too_few_fine_bars",
            SkipReason::NoRange => "no_range",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ReadFailure(msg) => write!(f, "read_failure: {msg}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Session timing and minimum-data rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionWindow {
    /// Exchange time zone the wall-clock bounds are expressed in.
    pub timezone: Tz,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Breakout scan, retest deadline and entry cutoff all end here.
    pub scan_window_minutes: i64,
    /// First coarse bar at or after `open + tolerance` marks a truncated session.
    pub late_open_tolerance_minutes: i64,
    pub min_window_bars: usize,
    /// Prior-session fine bars used to warm the volume average.
    pub warmup_bars: usize,
    pub volume_avg_window: usize,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            scan_window_minutes: 90,
            late_open_tolerance_minutes: 5,
            min_window_bars: 10,
            warmup_bars: 30,
            volume_avg_window: super::annotate::VOLUME_AVG_WINDOW,
        }
    }
}

/// One session's bounds in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBounds {
    pub date: NaiveDate,
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
    pub scan_end: DateTime<Utc>,
}

impl SessionBounds {
    /// Half-open session membership: `[open, close)`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.open && t < self.close
    }

    /// Half-open scan window membership: `[open, scan_end)`.
    pub fn in_scan_window(&self, t: DateTime<Utc>) -> bool {
        t >= self.open && t < self.scan_end
    }
}

impl SessionWindow {
    /// Convert the wall-clock window to UTC for `date`.
    ///
    /// An ambiguous local time resolves to its earliest instant; a
    /// non-existent one skips the session.
    pub fn bounds(&self, date: NaiveDate) -> Result<SessionBounds, SkipReason> {
        let open = self.to_utc(date, self.start)?;
        let close = self.to_utc(date, self.end)?;
        if close <= open {
            return Err(SkipReason::TimeConversion);
        }
        Ok(SessionBounds {
            date,
            open,
            close,
            scan_end: open + Duration::minutes(self.scan_window_minutes),
        })
    }

    fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, SkipReason> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or(SkipReason::TimeConversion)
    }
}

/// Bars dropped while cleaning a session's frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HygieneReport {
    pub duplicates: usize,
    pub insane: usize,
}

impl HygieneReport {
    pub fn merge(&mut self, other: HygieneReport) {
        self.duplicates += other.duplicates;
        self.insane += other.insane;
    }
}

/// Aligned, annotated frames for one (symbol, date).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub symbol: String,
    pub bounds: SessionBounds,
    /// In-session coarse bars, ascending.
    pub coarse: Vec<AnnotatedBar>,
    /// In-session fine bars, ascending; warm-up rows already dropped.
    pub fine: Vec<AnnotatedBar>,
    /// Median fine-bar volume over the current day.
    pub fine_median_volume: f64,
    /// Number of prior-session rows used to warm the fine volume average.
    pub seed_rows: usize,
    pub hygiene: HygieneReport,
}

impl SessionData {
    pub fn date(&self) -> NaiveDate {
        self.bounds.date
    }
}
