//! Week-long bar fixtures for runner tests.
//!
//! Week of 2024-03-04 (before the US DST change):
//! - Mon: no data
//! - Tue: breakout, retest, confirmation, target hit
//! - Wed: breakout, never retested
//! - Thu: same setup as Tue, drifts to the close (forced)
//! - Fri: no data

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use retestlab_core::data::{BarSource, DataError, MemoryBarSource, SessionWindow};
use retestlab_core::domain::{Bar, Granularity};
use retestlab_runner::BacktestConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SYMBOL: &str = "TEST";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn open_utc(date: NaiveDate) -> DateTime<Utc> {
    SessionWindow::default().bounds(date).unwrap().open
}

fn quiet(t: DateTime<Utc>, price: f64, volume: f64) -> Bar {
    Bar::new(t, price, price + 0.1, price - 0.1, price, volume)
}

struct Day {
    open: DateTime<Utc>,
    coarse: Vec<Bar>,
    fine: Vec<Bar>,
}

impl Day {
    fn new(date: NaiveDate, price: f64) -> Self {
        let open = open_utc(date);
        Self {
            open,
            coarse: (0..78)
                .map(|i| quiet(open + Duration::minutes(5 * i), price, 5_000.0))
                .collect(),
            fine: (0..390)
                .map(|i| quiet(open + Duration::minutes(i), price, 1_000.0))
                .collect(),
        }
    }

    fn coarse(mut self, i: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        self.coarse[i] = Bar::new(self.open + Duration::minutes(5 * i as i64), o, h, l, c, v);
        self
    }

    fn fine(mut self, m: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        self.fine[m] = Bar::new(self.open + Duration::minutes(m as i64), o, h, l, c, v);
        self
    }

    fn fine_quiet(mut self, from: usize, to: usize, price: f64) -> Self {
        for m in from..=to {
            self.fine[m] = quiet(self.open + Duration::minutes(m as i64), price, 1_000.0);
        }
        self
    }
}

/// OR = [99, 101], long breakout on coarse bar 1 closing 101.5.
fn breakout_day(date: NaiveDate) -> Day {
    Day::new(date, 100.5)
        .coarse(0, 100.0, 101.0, 99.0, 100.5, 1_000.0)
        .coarse(1, 100.8, 101.6, 100.7, 101.5, 3_000.0)
}

fn winning_day(date: NaiveDate) -> Day {
    breakout_day(date)
        .fine(11, 101.0, 101.3, 101.0, 101.2, 800.0)
        .fine(12, 101.2, 101.45, 101.15, 101.4, 1_000.0)
        .fine(13, 101.4, 101.5, 101.35, 101.45, 1_000.0)
        .fine_quiet(14, 19, 101.6)
        .fine(20, 101.7, 102.5, 101.65, 102.4, 2_000.0)
        .fine_quiet(21, 389, 102.4)
}

fn drifting_day(date: NaiveDate) -> Day {
    winning_day(date)
        .fine(20, 101.6, 101.7, 101.5, 101.6, 1_000.0)
        .fine_quiet(21, 389, 101.6)
}

fn insert(source: &mut MemoryBarSource, symbol: &str, date: NaiveDate, day: Day) {
    source.insert(symbol, date, Granularity::Coarse, day.coarse);
    source.insert(symbol, date, Granularity::Fine, day.fine);
}

pub fn week_source() -> MemoryBarSource {
    let mut source = MemoryBarSource::new();
    insert(&mut source, SYMBOL, date(2024, 3, 5), winning_day(date(2024, 3, 5)));
    insert(&mut source, SYMBOL, date(2024, 3, 6), breakout_day(date(2024, 3, 6)));
    insert(&mut source, SYMBOL, date(2024, 3, 7), drifting_day(date(2024, 3, 7)));
    source
}

pub fn week_config(level: u8) -> BacktestConfig {
    BacktestConfig::from_toml(&format!(
        r#"
[backtest]
symbols = ["{SYMBOL}"]
start_date = "2024-03-04"
end_date = "2024-03-08"
level = {level}
"#
    ))
    .unwrap()
}

/// Counts coarse-frame reads to observe cache hits.
pub struct CountingSource {
    pub inner: MemoryBarSource,
    pub coarse_reads: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: MemoryBarSource) -> Arc<Self> {
        Arc::new(Self {
            inner,
            coarse_reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.coarse_reads.load(Ordering::SeqCst)
    }
}

impl BarSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    fn get_day(
        &self,
        symbol: &str,
        date: NaiveDate,
        granularity: Granularity,
    ) -> Result<Option<Vec<Bar>>, DataError> {
        if granularity == Granularity::Coarse {
            self.coarse_reads.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.get_day(symbol, date, granularity)
    }
}

/// Every read fails.
pub struct BrokenSource;

impl BarSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
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
            reason: "connection reset".into(),
        })
    }
}
