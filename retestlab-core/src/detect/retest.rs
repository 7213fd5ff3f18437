//! Stage 3 — first fine bar that retests the breakout level.
//!
//! The search starts one coarse-bar duration after the breakout bar's open
//! (i.e. once the breakout bar has closed) and ends at the scan deadline,
//! inclusive. The first bar accepted by the active predicate wins.
//! Predicates see the annotated bar so they can check the session VWAP.

use crate::data::AnnotatedBar;
use crate::domain::{
    Bar, BreakoutCandidate, Direction, RetestEvent, WickContact, COARSE_BAR_MINUTES,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Retest acceptance predicate, chosen once per run.
pub trait RetestPredicate: Send + Sync {
    /// Human-readable name (e.g., "strict_body").
    fn name(&self) -> &str;

    /// `Some` when `bar` is a valid retest of `level`; carries the wick
    /// classification when the predicate produces one.
    fn evaluate(
        &self,
        bar: &AnnotatedBar,
        direction: Direction,
        level: f64,
    ) -> Option<RetestMatch>;
}

/// An accepted retest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetestMatch {
    pub contact: Option<WickContact>,
}

/// Open and close both on or beyond the level in the trade direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrictBody;

impl RetestPredicate for StrictBody {
    fn name(&self) -> &str {
        "strict_body"
    }

    fn evaluate(
        &self,
        bar: &AnnotatedBar,
        direction: Direction,
        level: f64,
    ) -> Option<RetestMatch> {
        body_holds(&bar.bar, direction, level).then_some(RetestMatch { contact: None })
    }
}

fn body_holds(bar: &Bar, direction: Direction, level: f64) -> bool {
    direction.at_or_beyond(bar.open, level) && direction.at_or_beyond(bar.close, level)
}

/// Strict body, and the close also sits on the trade side of the session VWAP.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VwapStrictBody;

impl RetestPredicate for VwapStrictBody {
    fn name(&self) -> &str {
        "strict_body_vwap"
    }

    fn evaluate(
        &self,
        bar: &AnnotatedBar,
        direction: Direction,
        level: f64,
    ) -> Option<RetestMatch> {
        let holds = body_holds(&bar.bar, direction, level)
            && direction.at_or_beyond(bar.bar.close, bar.vwap);
        holds.then_some(RetestMatch { contact: None })
    }
}

/// Which wick contacts the wick-tolerant predicate accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMode {
    Touch,
    Pierce,
    #[default]
    Either,
}

/// Wick touches or pierces the level, close lands on the trade side within a tick.
///
/// For a long at level `L` with tolerance `tol = L × bps / 10_000`:
/// - touch: `|low − L| ≤ tol`
/// - pierce: `low < L − tol`, rejected when deeper than `pierce_max_bps`
/// - close: `close ≥ L − tick`
///
/// Shorts mirror this on the high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WickTolerant {
    pub tolerance_bps: f64,
    pub pierce_max_bps: Option<f64>,
    pub contact: ContactMode,
    pub tick_size: f64,
}

impl WickTolerant {
    /// Classify the wick against the level, `None` if it never reached it.
    pub fn classify(
        &self,
        bar: &Bar,
        direction: Direction,
        level: f64,
    ) -> Option<(WickContact, f64)> {
        let tol = level * self.tolerance_bps / 10_000.0;
        let (wick, overshoot) = match direction {
            Direction::Long => (bar.low, level - bar.low),
            Direction::Short => (bar.high, bar.high - level),
        };
        let depth_bps = if level > 0.0 { overshoot / level * 10_000.0 } else { 0.0 };
        if (wick - level).abs() <= tol {
            Some((WickContact::Touch, depth_bps))
        } else if overshoot > tol {
            Some((WickContact::Pierce, depth_bps))
        } else {
            None
        }
    }
}

impl RetestPredicate for WickTolerant {
    fn name(&self) -> &str {
        "wick_tolerant"
    }

    fn evaluate(
        &self,
        bar: &AnnotatedBar,
        direction: Direction,
        level: f64,
    ) -> Option<RetestMatch> {
        let bar = &bar.bar;
        let (contact, depth_bps) = self.classify(bar, direction, level)?;
        let allowed = match (self.contact, contact) {
            (ContactMode::Either, _) => true,
            (ContactMode::Touch, WickContact::Touch) => true,
            (ContactMode::Pierce, WickContact::Pierce) => true,
            _ => false,
        };
        if !allowed {
            return None;
        }
        if contact == WickContact::Pierce {
            if let Some(cap) = self.pierce_max_bps {
                if depth_bps > cap {
                    return None;
                }
            }
        }
        let close_ok = direction.at_or_beyond(bar.close, level - direction.sign() * self.tick_size);
        close_ok.then_some(RetestMatch {
            contact: Some(contact),
        })
    }
}

/// Config-level choice of retest predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetestRule {
    #[default]
    StrictBody,
    StrictBodyVwap,
    WickTolerant {
        #[serde(default = "default_tolerance_bps")]
        tolerance_bps: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pierce_max_bps: Option<f64>,
        #[serde(default)]
        contact: ContactMode,
    },
}

fn default_tolerance_bps() -> f64 {
    10.0
}

impl RetestRule {
    /// Build the predicate; the wick-tolerant close check uses `tick_size`.
    pub fn build(&self, tick_size: f64) -> Box<dyn RetestPredicate> {
        match *self {
            RetestRule::StrictBody => Box::new(StrictBody),
            RetestRule::StrictBodyVwap => Box::new(VwapStrictBody),
            RetestRule::WickTolerant {
                tolerance_bps,
                pierce_max_bps,
                contact,
            } => Box::new(WickTolerant {
                tolerance_bps,
                pierce_max_bps,
                contact,
                tick_size,
            }),
        }
    }
}

/// Finds the retest for a breakout candidate.
pub struct RetestDetector {
    predicate: Box<dyn RetestPredicate>,
}

impl RetestDetector {
    pub fn new(predicate: Box<dyn RetestPredicate>) -> Self {
        Self { predicate }
    }

    pub fn predicate_name(&self) -> &str {
        self.predicate.name()
    }

    /// First accepted fine bar in `[breakout.time + 5m, deadline]`.
    pub fn detect(
        &self,
        fine: &[AnnotatedBar],
        breakout: &BreakoutCandidate,
        deadline: DateTime<Utc>,
    ) -> Option<RetestEvent> {
        let start = breakout.time + Duration::minutes(COARSE_BAR_MINUTES);
        fine.iter()
            .skip_while(|b| b.bar.timestamp < start)
            .take_while(|b| b.bar.timestamp <= deadline)
            .find_map(|b| {
                self.predicate
                    .evaluate(b, breakout.direction, breakout.level)
                    .map(|m| RetestEvent {
                        time: b.bar.timestamp,
                        bar: b.bar,
                        contact: m.contact,
                    })
            })
    }
}

impl Default for RetestDetector {
    fn default() -> Self {
        Self::new(Box::new(StrictBody))
    }
}

impl std::fmt::Debug for RetestDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetestDetector")
            .field("predicate", &self.predicate.name())
            .finish()
    }
}
