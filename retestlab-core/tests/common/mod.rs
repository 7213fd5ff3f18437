//! Shared session fixtures for integration tests.
//!
//! Sessions are described in minutes from the exchange open; the builder
//! turns them into UTC-stamped bars via the default session window, so the
//! same script works on either side of a DST change.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use retestlab_core::data::{MemoryBarSource, SessionAligner, SessionData, SessionWindow};
use retestlab_core::domain::{Bar, Granularity};

pub const SYMBOL: &str = "TEST";
pub const SESSION_MINUTES: i64 = 390;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn open_utc(date: NaiveDate) -> DateTime<Utc> {
    SessionWindow::default().bounds(date).unwrap().open
}

/// A flat bar centred on `price` with a 0.1 half-range.
pub fn quiet(t: DateTime<Utc>, price: f64, volume: f64) -> Bar {
    Bar::new(t, price, price + 0.1, price - 0.1, price, volume)
}

/// Minute-by-minute session script.
pub struct SessionBuilder {
    pub date: NaiveDate,
    pub open: DateTime<Utc>,
    coarse: Vec<Bar>,
    fine: Vec<Bar>,
}

impl SessionBuilder {
    /// 78 quiet coarse bars and 390 quiet fine bars around `price`.
    pub fn new(date: NaiveDate, price: f64) -> Self {
        let open = open_utc(date);
        let coarse = (0..SESSION_MINUTES / 5)
            .map(|i| quiet(open + Duration::minutes(5 * i), price, 5_000.0))
            .collect();
        let fine = (0..SESSION_MINUTES)
            .map(|i| quiet(open + Duration::minutes(i), price, 1_000.0))
            .collect();
        Self {
            date,
            open,
            coarse,
            fine,
        }
    }

    pub fn coarse(mut self, index: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        let t = self.open + Duration::minutes(5 * index as i64);
        self.coarse[index] = Bar::new(t, o, h, l, c, v);
        self
    }

    pub fn fine(mut self, minute: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        let t = self.open + Duration::minutes(minute as i64);
        self.fine[minute] = Bar::new(t, o, h, l, c, v);
        self
    }

    /// Overwrite fine minutes `[from, to]` with quiet bars at `price`.
    pub fn fine_quiet(mut self, from: usize, to: usize, price: f64) -> Self {
        for minute in from..=to.min(self.fine.len() - 1) {
            let t = self.open + Duration::minutes(minute as i64);
            self.fine[minute] = quiet(t, price, 1_000.0);
        }
        self
    }

    pub fn truncate_fine(mut self, minutes: usize) -> Self {
        self.fine.truncate(minutes);
        self
    }

    pub fn source(&self) -> MemoryBarSource {
        MemoryBarSource::new()
            .with_day(SYMBOL, self.date, Granularity::Coarse, self.coarse.clone())
            .with_day(SYMBOL, self.date, Granularity::Fine, self.fine.clone())
    }

    pub fn insert_into(&self, source: &mut MemoryBarSource) {
        source.insert(SYMBOL, self.date, Granularity::Coarse, self.coarse.clone());
        source.insert(SYMBOL, self.date, Granularity::Fine, self.fine.clone());
    }

    pub fn align(&self) -> SessionData {
        SessionAligner::default()
            .align(&self.source(), SYMBOL, self.date)
            .unwrap()
    }
}

/// OR = [99, 101]; one long breakout on coarse bar 1 (09:35) closing 101.5.
pub fn breakout_day(date: NaiveDate) -> SessionBuilder {
    SessionBuilder::new(date, 100.5)
        .coarse(0, 100.0, 101.0, 99.0, 100.5, 1_000.0)
        .coarse(1, 100.8, 101.6, 100.7, 101.5, 3_000.0)
}

/// Scenario A: retest at +6 min from the breakout (minute 11), Level 1
/// confirmation at minute 12, entry at minute 13, target reached at minute 20.
pub fn scenario_a(date: NaiveDate) -> SessionBuilder {
    breakout_day(date)
        .fine(11, 101.0, 101.3, 101.0, 101.2, 800.0)
        .fine(12, 101.2, 101.45, 101.15, 101.4, 1_000.0)
        .fine(13, 101.4, 101.5, 101.35, 101.45, 1_000.0)
        .fine_quiet(14, 19, 101.6)
        .fine(20, 101.7, 102.5, 101.65, 102.4, 2_000.0)
        .fine_quiet(21, 389, 102.4)
}

/// Scenario D: same entry as A, price drifts without reaching stop or target.
pub fn scenario_d(date: NaiveDate) -> SessionBuilder {
    scenario_a(date)
        .fine(20, 101.6, 101.7, 101.5, 101.6, 1_000.0)
        .fine_quiet(21, 389, 101.6)
}
