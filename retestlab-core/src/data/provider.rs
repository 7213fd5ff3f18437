//! Bar source trait and structured error types.
//!
//! The BarSource trait abstracts over wherever per-day bar frames live (an
//! on-disk cache, a vendor client, fixtures) so the aligner never knows
//! about storage and tests can inject bars directly.

use crate::domain::{Bar, Granularity};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Structured error types for bar reads.
///
/// A read error never aborts a run; the aligner turns it into a
/// `SkipReason::ReadFailure` for that session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("read failure for {symbol} on {date}: {reason}")]
    ReadFailure {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },
}

/// Trait for per-day bar sources.
///
/// Contract: a returned frame holds only bars for the requested calendar
/// date, ascending and deduplicated. `Ok(None)` means "no data for that
/// day" (holiday, weekend, not cached) and is not an error.
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch one day's bars at the given granularity.
    fn get_day(
        &self,
        symbol: &str,
        date: NaiveDate,
        granularity: Granularity,
    ) -> Result<Option<Vec<Bar>>, DataError>;
}

/// In-memory bar source keyed by (symbol, date, granularity).
#[derive(Debug, Default, Clone)]
pub struct MemoryBarSource {
    frames: HashMap<(String, NaiveDate, Granularity), Vec<Bar>>,
}

impl MemoryBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any existing frame for the same key.
    pub fn insert(
        &mut self,
        symbol: impl Into<String>,
        date: NaiveDate,
        granularity: Granularity,
        bars: Vec<Bar>,
    ) {
        self.frames.insert((symbol.into(), date, granularity), bars);
    }

    /// Builder-style `insert`.
    pub fn with_day(
        mut self,
        symbol: impl Into<String>,
        date: NaiveDate,
        granularity: Granularity,
        bars: Vec<Bar>,
    ) -> Self {
        self.insert(symbol, date, granularity, bars);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl BarSource for MemoryBarSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_day(
        &self,
        symbol: &str,
        date: NaiveDate,
        granularity: Granularity,
    ) -> Result<Option<Vec<Bar>>, DataError> {
        Ok(self
            .frames
            .get(&(symbol.to_string(), date, granularity))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn bar() -> Bar {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 13, 30, 0).unwrap();
        Bar::new(t, 10.0, 10.5, 9.8, 10.2, 1_000.0)
    }

    #[test]
    fn memory_source_returns_inserted_frame() {
        let source = MemoryBarSource::new().with_day("MSFT", day(), Granularity::Fine, vec![bar()]);
        let frame = source.get_day("MSFT", day(), Granularity::Fine).unwrap().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(source.name(), "memory");
    }

    #[test]
    fn granularity_is_part_of_the_key() {
        let source = MemoryBarSource::new().with_day("MSFT", day(), Granularity::Fine, vec![bar()]);
        assert!(source.get_day("MSFT", day(), Granularity::Coarse).unwrap().is_none());
        assert!(source.get_day("AAPL", day(), Granularity::Fine).unwrap().is_none());
    }

    #[test]
    fn data_error_display() {
        let err = DataError::ReadFailure {
            symbol: "MSFT".into(),
            date: day(),
            reason: "truncated file".into(),
        };
        assert_eq!(err.to_string(), "read failure for MSFT on 2024-06-03: truncated file");
    }
}
