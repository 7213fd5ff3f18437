//! Exit resolution for an open bracket (stop + target).
//!
//! When one bar's range covers both the stop and the target, the order of
//! events inside the bar is unknown. The stop is always evaluated first, so
//! such a bar is booked as a loss.

use crate::domain::{Bar, Direction, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where and how a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitFill {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub outcome: Outcome,
}

/// Stop breached on this bar (low for longs, high for shorts).
pub fn stop_hit(bar: &Bar, side: Direction, stop: f64) -> bool {
    match side {
        Direction::Long => bar.low <= stop,
        Direction::Short => bar.high >= stop,
    }
}

/// Target reached on this bar (high for longs, low for shorts).
pub fn target_hit(bar: &Bar, side: Direction, target: f64) -> bool {
    match side {
        Direction::Long => bar.high >= target,
        Direction::Short => bar.low <= target,
    }
}

/// Resolve one bar: stop before target. Fills at the level, not the extreme.
pub fn check_bar(bar: &Bar, side: Direction, stop: f64, target: f64) -> Option<ExitFill> {
    if stop_hit(bar, side, stop) {
        return Some(ExitFill {
            time: bar.timestamp,
            price: stop,
            outcome: Outcome::Loss,
        });
    }
    if target_hit(bar, side, target) {
        return Some(ExitFill {
            time: bar.timestamp,
            price: target,
            outcome: Outcome::Win,
        });
    }
    None
}
