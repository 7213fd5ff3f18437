//! Quality gate for confirmed (level 2+) candidates.
//!
//! Scoring itself lives outside the backtester: a `CandidateScorer` attaches
//! an optional numeric score, and the configured gate decides pass/reject
//! from it. The default gate passes everything.

use retestlab_core::domain::Candidate;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Pass/reject decision for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateVerdict {
    Passed,
    Rejected { reason: String },
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, GateVerdict::Passed)
    }
}

/// Accepts or rejects a candidate given its pre-attached score.
pub trait QualityGate: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, candidate: &Candidate, score: Option<f64>) -> GateVerdict;
}

/// Attaches a score to a candidate. Implemented by external graders.
pub trait CandidateScorer: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, candidate: &Candidate) -> Option<f64>;
}

/// Scorer that never scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unscored;

impl CandidateScorer for Unscored {
    fn name(&self) -> &str {
        "unscored"
    }

    fn score(&self, _candidate: &Candidate) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl QualityGate for PassThrough {
    fn name(&self) -> &str {
        "pass_through"
    }

    fn evaluate(&self, _candidate: &Candidate, _score: Option<f64>) -> GateVerdict {
        GateVerdict::Passed
    }
}

/// Rejects candidates scoring below a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinScoreGate {
    pub min_score: f64,
    /// Reject candidates the scorer left unscored.
    pub reject_unscored: bool,
}

impl QualityGate for MinScoreGate {
    fn name(&self) -> &str {
        "min_score"
    }

    fn evaluate(&self, _candidate: &Candidate, score: Option<f64>) -> GateVerdict {
        match score {
            Some(s) if s >= self.min_score => GateVerdict::Passed,
            Some(s) => GateVerdict::Rejected {
                reason: format!("score {s:.1} below {:.1}", self.min_score),
            },
            None if self.reject_unscored => GateVerdict::Rejected {
                reason: "unscored".to_string(),
            },
            None => GateVerdict::Passed,
        }
    }
}

/// `[gate]` section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateConfig {
    #[default]
    PassThrough,
    MinScore {
        min_score: f64,
        #[serde(default)]
        reject_unscored: bool,
    },
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            GateConfig::PassThrough => Ok(()),
            GateConfig::MinScore { min_score, .. } => {
                if min_score.is_finite() && *min_score >= 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::Gate(format!(
                        "min_score must be a non-negative number, got {min_score}"
                    )))
                }
            }
        }
    }

    pub fn build(&self) -> Box<dyn QualityGate> {
        match self {
            GateConfig::PassThrough => Box::new(PassThrough),
            GateConfig::MinScore {
                min_score,
                reject_unscored,
            } => Box::new(MinScoreGate {
                min_score: *min_score,
                reject_unscored: *reject_unscored,
            }),
        }
    }
}
