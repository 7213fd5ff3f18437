//! Session alignment: raw day frames → cleaned, annotated session data.
//!
//! Fine bars are warmed with the tail of the prior trading session so the
//! volume average is not cold at the open. Warm-up rows are dropped before
//! the session data is returned.

use super::annotate::{annotate, median_volume};
use super::provider::BarSource;
use super::session::{HygieneReport, SessionBounds, SessionData, SessionWindow, SkipReason};
use crate::domain::{Bar, Granularity};
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

/// Calendar days searched backwards for a prior session to warm from.
pub const MAX_SEED_LOOKBACK_DAYS: i64 = 7;

/// Builds `SessionData` from a `BarSource`.
#[derive(Debug, Clone, Default)]
pub struct SessionAligner {
    window: SessionWindow,
}

impl SessionAligner {
    pub fn new(window: SessionWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &SessionWindow {
        &self.window
    }

    /// Align one (symbol, date). Every failure is a `SkipReason`.
    pub fn align(
        &self,
        source: &dyn BarSource,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<SessionData, SkipReason> {
        let bounds = self.window.bounds(date)?;
        let mut hygiene = HygieneReport::default();

        let coarse_raw = read(source, symbol, date, Granularity::Coarse)?
            .ok_or(SkipReason::NoCoarseData)?;
        let (coarse, report) = clean(coarse_raw, &bounds);
        hygiene.merge(report);

        let first = coarse.first().ok_or(SkipReason::NoCoarseData)?;
        let late_after = bounds.open + Duration::minutes(self.window.late_open_tolerance_minutes);
        if first.timestamp >= late_after {
            debug!(symbol, %date, first = %first.timestamp, "truncated session");
            return Err(SkipReason::LateOpen);
        }

        let in_scan = coarse
            .iter()
            .filter(|b| bounds.in_scan_window(b.timestamp))
            .count();
        if in_scan < self.window.min_window_bars {
            return Err(SkipReason::TooFewCoarseBars);
        }

        let fine_raw = read(source, symbol, date, Granularity::Fine)?
            .ok_or(SkipReason::NoFineData)?;
        let (fine, report) = clean(fine_raw, &bounds);
        hygiene.merge(report);
        if fine.is_empty() {
            return Err(SkipReason::NoFineData);
        }
        if fine.len() < self.window.min_window_bars {
            return Err(SkipReason::TooFewFineBars);
        }

        let seed = self.prior_session_tail(source, symbol, date);
        let coarse = annotate(&[], &coarse, self.window.volume_avg_window);
        let fine = annotate(&seed, &fine, self.window.volume_avg_window);
        let fine_median_volume = median_volume(&fine);

        debug!(
            symbol,
            %date,
            coarse = coarse.len(),
            fine = fine.len(),
            seed = seed.len(),
            "session aligned"
        );

        Ok(SessionData {
            symbol: symbol.to_string(),
            bounds,
            coarse,
            fine,
            fine_median_volume,
            seed_rows: seed.len(),
            hygiene,
        })
    }

    /// Last `warmup_bars` in-session fine bars of the nearest earlier day with data.
    ///
    /// Seed problems never skip the current session: the average simply
    /// starts cold.
    fn prior_session_tail(
        &self,
        source: &dyn BarSource,
        symbol: &str,
        date: NaiveDate,
    ) -> Vec<Bar> {
        if self.window.warmup_bars == 0 {
            return Vec::new();
        }
        for back in 1..=MAX_SEED_LOOKBACK_DAYS {
            let prior = date - Duration::days(back);
            let Ok(bounds) = self.window.bounds(prior) else {
                continue;
            };
            let frame = match source.get_day(symbol, prior, Granularity::Fine) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    warn!(symbol, %prior, error = %e, "warm-up read failed; starting cold");
                    return Vec::new();
                }
            };
            let (bars, _) = clean(frame, &bounds);
            if bars.is_empty() {
                continue;
            }
            let start = bars.len().saturating_sub(self.window.warmup_bars);
            return bars[start..].to_vec();
        }
        Vec::new()
    }
}

fn read(
    source: &dyn BarSource,
    symbol: &str,
    date: NaiveDate,
    granularity: Granularity,
) -> Result<Option<Vec<Bar>>, SkipReason> {
    match source.get_day(symbol, date, granularity) {
        Ok(Some(frame)) if frame.is_empty() => Ok(None),
        Ok(frame) => Ok(frame),
        Err(e) => {
            warn!(
                symbol,
                %date,
                ?granularity,
                source = source.name(),
                error = %e,
                "bar read failed"
            );
            Err(SkipReason::ReadFailure(e.to_string()))
        }
    }
}

/// Sort, drop duplicate timestamps (first wins), drop bars breaking the OHLC
/// invariant, and keep only bars inside the session.
fn clean(mut bars: Vec<Bar>, bounds: &SessionBounds) -> (Vec<Bar>, HygieneReport) {
    let mut report = HygieneReport::default();
    bars.sort_by_key(|b| b.timestamp);

    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    report.duplicates = before - bars.len();

    let before = bars.len();
    bars.retain(Bar::is_sane);
    report.insane = before - bars.len();

    bars.retain(|b| bounds.contains(b.timestamp));
    (bars, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataError, MemoryBarSource};
    use chrono::{DateTime, TimeZone, Utc};

    const SYM: &str = "NVDA";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
    }

    fn open_utc(date: NaiveDate) -> DateTime<Utc> {
        SessionWindow::default().bounds(date).unwrap().open
    }

    fn series(start: DateTime<Utc>, step_min: i64, n: usize, volume: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let t = start + Duration::minutes(step_min * i as i64);
                Bar::new(t, 100.0, 101.0, 99.0, 100.5, volume)
            })
            .collect()
    }

    fn full_day(date: NaiveDate) -> MemoryBarSource {
        let open = open_utc(date);
        MemoryBarSource::new()
            .with_day(SYM, date, Granularity::Coarse, series(open, 5, 78, 5_000.0))
            .with_day(SYM, date, Granularity::Fine, series(open, 1, 390, 1_000.0))
    }

    #[test]
    fn aligns_a_clean_session() {
        let data = SessionAligner::default().align(&full_day(date()), SYM, date()).unwrap();
        assert_eq!(data.coarse.len(), 78);
        assert_eq!(data.fine.len(), 390);
        assert_eq!(data.seed_rows, 0);
        assert_eq!(data.fine_median_volume, 1_000.0);
    }

    #[test]
    fn missing_coarse_frame_skips() {
        let err = SessionAligner::default()
            .align(&MemoryBarSource::new(), SYM, date())
            .unwrap_err();
        assert_eq!(err, SkipReason::NoCoarseData);
    }

    #[test]
    fn late_first_bar_skips_session() {
        let late = open_utc(date()) + Duration::minutes(30);
        let source = MemoryBarSource::new()
            .with_day(SYM, date(), Granularity::Coarse, series(late, 5, 60, 5_000.0))
            .with_day(SYM, date(), Granularity::Fine, series(late, 1, 300, 1_000.0));
        let err = SessionAligner::default().align(&source, SYM, date()).unwrap_err();
        assert_eq!(err, SkipReason::LateOpen);
    }

    #[test]
    fn sparse_scan_window_skips() {
        let open = open_utc(date());
        let source = MemoryBarSource::new()
            .with_day(SYM, date(), Granularity::Coarse, series(open, 5, 6, 5_000.0))
            .with_day(SYM, date(), Granularity::Fine, series(open, 1, 390, 1_000.0));
        let err = SessionAligner::default().align(&source, SYM, date()).unwrap_err();
        assert_eq!(err, SkipReason::TooFewCoarseBars);
    }

    #[test]
    fn sparse_fine_frame_skips() {
        let open = open_utc(date());
        let source = MemoryBarSource::new()
            .with_day(SYM, date(), Granularity::Coarse, series(open, 5, 78, 5_000.0))
            .with_day(SYM, date(), Granularity::Fine, series(open, 1, 4, 1_000.0));
        let err = SessionAligner::default().align(&source, SYM, date()).unwrap_err();
        assert_eq!(err, SkipReason::TooFewFineBars);
    }

    #[test]
    fn premarket_bars_are_filtered() {
        let open = open_utc(date());
        let mut coarse = series(open - Duration::minutes(60), 5, 12, 5_000.0);
        coarse.extend(series(open, 5, 78, 5_000.0));
        let source = full_day(date()).with_day(SYM, date(), Granularity::Coarse, coarse);
        let data = SessionAligner::default().align(&source, SYM, date()).unwrap();
        assert_eq!(data.coarse[0].bar.timestamp, open);
    }

    #[test]
    fn hygiene_drops_duplicates_and_insane_bars() {
        let open = open_utc(date());
        let mut fine = series(open, 1, 390, 1_000.0);
        fine.push(fine[10]);
        fine.push(Bar::new(open + Duration::minutes(500), 100.0, 90.0, 99.0, 100.0, 1.0));
        fine.reverse();
        let source = full_day(date()).with_day(SYM, date(), Granularity::Fine, fine);
        let data = SessionAligner::default().align(&source, SYM, date()).unwrap();
        assert_eq!(data.hygiene.duplicates, 1);
        assert_eq!(data.hygiene.insane, 1);
        assert!(data.fine.windows(2).all(|w| w[0].bar.timestamp < w[1].bar.timestamp));
    }

    #[test]
    fn warms_from_prior_trading_day_over_weekend() {
        let monday = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        let friday = NaiveDate::from_ymd_opt(2024, 7, 12).unwrap();
        let mut source = full_day(monday);
        source.insert(SYM, friday, Granularity::Fine, series(open_utc(friday), 1, 390, 9_000.0));
        let data = SessionAligner::default().align(&source, SYM, monday).unwrap();
        assert_eq!(data.seed_rows, 30);
        // 30 warm rows at 9k + the first 1k bar, capped at the 20-bar window.
        assert!((data.fine[0].volume_avg - (19.0 * 9_000.0 + 1_000.0) / 20.0).abs() < 1e-9);
        assert_eq!(data.fine.len(), 390);
    }

    struct FailingSource;

    impl BarSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn get_day(
            &self,
            symbol: &str,
            date: NaiveDate,
            _: Granularity,
        ) -> Result<Option<Vec<Bar>>, DataError> {
            Err(DataError::ReadFailure {
                symbol: symbol.to_string(),
                date,
                reason: "disk".into(),
            })
        }
    }

    #[test]
    fn read_failure_becomes_skip_reason() {
        let err = SessionAligner::default().align(&FailingSource, SYM, date()).unwrap_err();
        assert!(matches!(err, SkipReason::ReadFailure(msg) if msg.contains("disk")));
    }

    #[test]
    fn utc_timestamps_are_accepted_in_summer_and_winter() {
        let winter = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let open = Utc.with_ymd_and_hms(2024, 1, 10, 14, 30, 0).unwrap();
        let source = MemoryBarSource::new()
            .with_day(SYM, winter, Granularity::Coarse, series(open, 5, 78, 5_000.0))
            .with_day(SYM, winter, Granularity::Fine, series(open, 1, 390, 1_000.0));
        let data = SessionAligner::default().align(&source, SYM, winter).unwrap();
        assert_eq!(data.coarse[0].bar.timestamp, open);
    }
}
