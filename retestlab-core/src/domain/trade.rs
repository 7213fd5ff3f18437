//! RealizedTrade — a simulated round trip from entry to exit.

use super::direction::Direction;
use crate::planner::TradePlan;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How a simulated trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Target touched before the stop.
    Win,
    /// Stop touched (including a same-bar stop/target tie).
    Loss,
    /// Data ran out; closed at the last available close.
    Forced,
}

/// Entry-bar continuation diagnostics, reported alongside each trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuationDiagnostics {
    /// Body share of the entry bar's range.
    pub body_pct: f64,
    /// Entry bar volume over retest bar volume; `None` if the retest had no volume.
    pub volume_ratio: Option<f64>,
    /// Fraction of the entry→target distance covered by the entry bar's close.
    pub progress_to_target: f64,
}

/// A completed round-trip trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedTrade {
    // ── Identification ──
    pub symbol: String,
    pub session_date: NaiveDate,
    pub direction: Direction,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub outcome: Outcome,

    // ── PnL ──
    pub pnl: f64,

    pub plan: TradePlan,
    pub diagnostics: ContinuationDiagnostics,
}

impl RealizedTrade {
    pub fn shares(&self) -> u64 {
        self.plan.shares
    }

    /// P&L as a fraction of the notional committed at entry.
    pub fn return_pct(&self) -> f64 {
        if self.plan.notional == 0.0 {
            return 0.0;
        }
        self.pnl / self.plan.notional
    }

    pub fn is_winner(&self) -> bool {
        self.outcome == Outcome::Win
    }

    pub fn is_loser(&self) -> bool {
        self.outcome == Outcome::Loss
    }

    /// Wall-clock time in the trade.
    pub fn holding_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }
}
