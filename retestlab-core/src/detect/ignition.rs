//! Stage 4 — continuation confirmation after the retest.
//!
//! Two routes, tried in order:
//! 1. The retest bar itself is strong (body, close half, volume vs. the
//!    session median). The following fine bar becomes the anchor and no
//!    search runs.
//! 2. Otherwise the first fine bar in `[retest + 1m, retest + lookahead]`
//!    whose high exceeds the retest high (long) or whose low undercuts the
//!    retest low (short).

use crate::data::AnnotatedBar;
use crate::domain::{Bar, Direction, IgnitionEvent, IgnitionSource, RetestEvent, FINE_BAR_MINUTES};
use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnitionRules {
    pub lookahead_minutes: i64,
    /// Body share a retest bar needs to double as ignition.
    pub retest_min_body_pct: f64,
    /// Compare retest volume with the session fine-bar median.
    pub require_median_volume: bool,
}

impl Default for IgnitionRules {
    fn default() -> Self {
        Self {
            lookahead_minutes: 30,
            retest_min_body_pct: 0.6,
            require_median_volume: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IgnitionDetector {
    rules: IgnitionRules,
}

impl IgnitionDetector {
    pub fn new(rules: IgnitionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &IgnitionRules {
        &self.rules
    }

    /// Whether the retest bar is strong enough to act as its own ignition.
    ///
    /// The volume check is skipped when no session median is available.
    pub fn retest_qualifies(
        &self,
        bar: &Bar,
        direction: Direction,
        session_median: Option<f64>,
    ) -> bool {
        if bar.range() <= 0.0 || bar.body_pct() < self.rules.retest_min_body_pct {
            return false;
        }
        let right_half = match direction {
            Direction::Long => bar.close_position() >= 0.5,
            Direction::Short => bar.close_position() <= 0.5,
        };
        if !right_half {
            return false;
        }
        match session_median {
            Some(median) if self.rules.require_median_volume => bar.volume >= median,
            _ => true,
        }
    }

    pub fn detect(
        &self,
        fine: &[AnnotatedBar],
        retest: &RetestEvent,
        direction: Direction,
        session_median: Option<f64>,
    ) -> Option<IgnitionEvent> {
        if self.retest_qualifies(&retest.bar, direction, session_median) {
            return fine
                .iter()
                .find(|b| b.bar.timestamp > retest.time)
                .map(|next| IgnitionEvent {
                    time: next.bar.timestamp,
                    bar: next.bar,
                    source: IgnitionSource::RetestItself,
                });
        }

        let start = retest.time + Duration::minutes(FINE_BAR_MINUTES);
        let end = retest.time + Duration::minutes(self.rules.lookahead_minutes);
        fine.iter()
            .map(|b| &b.bar)
            .skip_while(|b| b.timestamp < start)
            .take_while(|b| b.timestamp <= end)
            .find(|b| breaks_extreme(b, &retest.bar, direction))
            .map(|bar| IgnitionEvent {
                time: bar.timestamp,
                bar: *bar,
                source: IgnitionSource::NextBar,
            })
    }
}

fn breaks_extreme(bar: &Bar, retest: &Bar, direction: Direction) -> bool {
    match direction {
        Direction::Long => bar.high > retest.high,
        Direction::Short => bar.low < retest.low,
    }
}
