//! Detection artifacts: the values each pipeline stage hands to the next.
//!
//! Every artifact carries copies of the bars it was derived from, never
//! indices or references into the session frame, so a `Candidate` stays valid
//! after the session data is dropped.

use super::{Bar, Direction};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Session reference band taken from the first coarse bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
    pub anchor: DateTime<Utc>,
}

impl OpeningRange {
    /// A usable range has positive prices and non-zero width.
    pub fn is_valid(&self) -> bool {
        self.high.is_finite() && self.low.is_finite() && self.low > 0.0 && self.high > self.low
    }

    /// Breakout level for a direction: the high for longs, the low for shorts.
    pub fn level(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.high,
            Direction::Short => self.low,
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// A coarse bar that closed beyond the opening range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutCandidate {
    pub direction: Direction,
    pub level: f64,
    pub time: DateTime<Utc>,
    pub bar: Bar,
    pub previous: Bar,
}

/// How a retest bar's wick related to the level (wick-tolerant predicate only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WickContact {
    /// Wick ended within tolerance of the level.
    Touch,
    /// Wick crossed the level by more than the tolerance.
    Pierce,
}

/// First fine bar after the breakout close that satisfied the retest predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetestEvent {
    pub time: DateTime<Utc>,
    pub bar: Bar,
    pub contact: Option<WickContact>,
}

/// Where the ignition anchor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnitionSource {
    /// A later bar broke the retest bar's extreme.
    NextBar,
    /// The retest bar was strong enough on its own; the bar after it is the anchor.
    RetestItself,
}

/// Continuation confirmation after the retest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnitionEvent {
    pub time: DateTime<Utc>,
    pub bar: Bar,
    pub source: IgnitionSource,
}

/// A complete setup: every stage required by the active level succeeded.
///
/// Never mutated after creation; downstream diagnostics are attached to the
/// records that wrap it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub session_date: NaiveDate,
    pub direction: Direction,
    pub level: f64,
    pub opening_range: OpeningRange,
    pub breakout: BreakoutCandidate,
    pub retest: RetestEvent,
    pub ignition: Option<IgnitionEvent>,
}

impl Candidate {
    /// Distance the breakout bar closed beyond the level.
    pub fn breakout_distance(&self) -> f64 {
        (self.breakout.bar.close - self.level).abs()
    }
}
