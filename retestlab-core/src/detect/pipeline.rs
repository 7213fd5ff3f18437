//! Pipeline orchestrator: opening range → breakout → retest → [ignition].
//!
//! ```text
//! Start → RangeEstablished → BreakoutFound → RetestFound → [IgnitionFound] → Candidate
//!   └──→ NoRange
//! ```
//!
//! Each breakout candidate runs its own chain. A stage that finds nothing
//! ends that chain silently; the funnel counters are the only trace.

use super::breakout::{BreakoutDetector, BreakoutFilter, BreakoutRules};
use super::ignition::{IgnitionDetector, IgnitionRules};
use super::retest::{RetestDetector, RetestRule};
use crate::data::SessionData;
use crate::domain::{Candidate, OpeningRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use tracing::debug;

/// Strictness dial.
///
/// - 0: stages 1–3, scan only
/// - 1: stages 1–3, executed
/// - 2+: stages 1–4, ignition mandatory, quality gate applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineLevel(pub u8);

impl PipelineLevel {
    pub const SCAN_ONLY: PipelineLevel = PipelineLevel(0);
    pub const EXECUTE: PipelineLevel = PipelineLevel(1);
    pub const CONFIRMED: PipelineLevel = PipelineLevel(2);

    pub fn executes(self) -> bool {
        self.0 >= 1
    }

    pub fn requires_ignition(self) -> bool {
        self.0 >= 2
    }

    pub fn uses_quality_gate(self) -> bool {
        self.0 >= 2
    }
}

impl fmt::Display for PipelineLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Per-stage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFunnel {
    pub sessions_scanned: usize,
    pub opening_ranges: usize,
    pub breakouts: usize,
    pub retests: usize,
    pub ignitions: usize,
    pub candidates: usize,
}

impl AddAssign for StageFunnel {
    fn add_assign(&mut self, rhs: Self) {
        self.sessions_scanned += rhs.sessions_scanned;
        self.opening_ranges += rhs.opening_ranges;
        self.breakouts += rhs.breakouts;
        self.retests += rhs.retests;
        self.ignitions += rhs.ignitions;
        self.candidates += rhs.candidates;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub level: PipelineLevel,
    pub breakout: BreakoutRules,
    pub retest: RetestRule,
    pub ignition: IgnitionRules,
    /// Close tolerance for the wick-tolerant retest.
    pub tick_size: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            level: PipelineLevel::EXECUTE,
            breakout: BreakoutRules::default(),
            retest: RetestRule::default(),
            ignition: IgnitionRules::default(),
            tick_size: 0.01,
        }
    }
}

/// Output of one session scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionScan {
    pub opening_range: Option<OpeningRange>,
    pub candidates: Vec<Candidate>,
    pub funnel: StageFunnel,
}

/// Composes the four stages for one strictness level.
#[derive(Debug)]
pub struct Pipeline {
    level: PipelineLevel,
    breakout: BreakoutDetector,
    retest: RetestDetector,
    ignition: IgnitionDetector,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            level: config.level,
            breakout: BreakoutDetector::new(Box::new(config.breakout.clone())),
            retest: RetestDetector::new(config.retest.build(config.tick_size)),
            ignition: IgnitionDetector::new(config.ignition.clone()),
        }
    }

    /// Replace the breakout quality rules with a custom filter.
    pub fn with_breakout_filter(mut self, filter: Box<dyn BreakoutFilter>) -> Self {
        self.breakout = BreakoutDetector::new(filter);
        self
    }

    pub fn level(&self) -> PipelineLevel {
        self.level
    }

    /// Run every stage the level requires over one aligned session.
    pub fn run_session(&self, session: &SessionData) -> SessionScan {
        let mut funnel = StageFunnel {
            sessions_scanned: 1,
            ..StageFunnel::default()
        };

        let Some(range) = OpeningRange::locate(&session.coarse) else {
            debug!(symbol = %session.symbol, date = %session.date(), "no opening range");
            return SessionScan {
                opening_range: None,
                candidates: Vec::new(),
                funnel,
            };
        };
        funnel.opening_ranges = 1;

        let bounds = &session.bounds;
        let breakouts = self.breakout.detect(&session.coarse, &range, bounds);
        funnel.breakouts = breakouts.len();

        let median = Some(session.fine_median_volume);
        let mut candidates = Vec::new();
        for breakout in breakouts {
            let Some(retest) = self.retest.detect(&session.fine, &breakout, bounds.scan_end) else {
                debug!(
                    symbol = %session.symbol,
                    time = %breakout.time,
                    direction = %breakout.direction,
                    "no retest"
                );
                continue;
            };
            funnel.retests += 1;

            let ignition = if self.level.requires_ignition() {
                match self.ignition.detect(&session.fine, &retest, breakout.direction, median) {
                    Some(ev) => {
                        funnel.ignitions += 1;
                        Some(ev)
                    }
                    None => {
                        debug!(symbol = %session.symbol, time = %retest.time, "no ignition");
                        continue;
                    }
                }
            } else {
                None
            };

            debug!(
                symbol = %session.symbol,
                direction = %breakout.direction,
                breakout = %breakout.time,
                retest = %retest.time,
                "candidate emitted"
            );
            candidates.push(Candidate {
                symbol: session.symbol.clone(),
                session_date: session.date(),
                direction: breakout.direction,
                level: breakout.level,
                opening_range: range,
                breakout,
                retest,
                ignition,
            });
        }
        funnel.candidates = candidates.len();

        SessionScan {
            opening_range: Some(range),
            candidates,
            funnel,
        }
    }
}
