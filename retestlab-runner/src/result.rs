//! Result documents produced per symbol.
//!
//! Everything here is presentation: timestamps are rendered in the
//! configured presentation zone as RFC 3339 with an explicit offset, so the
//! document can be consumed without knowing the exchange time zone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use retestlab_core::data::{HygieneReport, SkipReason};
use retestlab_core::detect::{PipelineLevel, StageFunnel};
use retestlab_core::domain::{
    Candidate, ContinuationDiagnostics, Direction, IgnitionSource, Outcome, RealizedTrade,
    WickContact,
};
use retestlab_core::engine::DropReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gate::GateVerdict;
use crate::metrics::SummaryMetrics;

/// Result document schema version. Bump on breaking layout changes.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Render a UTC instant in the presentation zone.
pub fn present(t: DateTime<Utc>, tz: Tz) -> String {
    t.with_timezone(&tz).to_rfc3339()
}

/// Complete per-symbol result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub level: PipelineLevel,
    pub config_hash: String,
    pub timezone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    // ── Counters ──
    pub candidates: usize,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub forced_closes: usize,
    pub total_pnl: f64,
    pub win_rate: f64,

    pub trades: Vec<TradeRecord>,
    /// Every candidate, executed or not.
    pub signals: Vec<SignalRecord>,
    pub diagnostics: RunDiagnostics,
    pub metrics: SummaryMetrics,
}

impl SymbolResult {
    /// True when no session made it through alignment.
    pub fn nothing_scanned(&self) -> bool {
        self.diagnostics.funnel.sessions_scanned == 0
    }
}

/// Presentation form of a `RealizedTrade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub session_date: NaiveDate,
    pub direction: Direction,
    pub entry_time: String,
    pub entry_price: f64,
    pub exit_time: String,
    pub exit_price: f64,
    pub outcome: Outcome,
    pub stop: f64,
    pub target: f64,
    pub shares: u64,
    pub pnl: f64,
    pub return_pct: f64,
    pub max_loss: f64,
    pub max_win: f64,
    pub notional: f64,
    pub holding_minutes: i64,
    pub diagnostics: ContinuationDiagnostics,
}

impl TradeRecord {
    pub fn from_trade(trade: &RealizedTrade, tz: Tz) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            session_date: trade.session_date,
            direction: trade.direction,
            entry_time: present(trade.entry_time, tz),
            entry_price: trade.entry_price,
            exit_time: present(trade.exit_time, tz),
            exit_price: trade.exit_price,
            outcome: trade.outcome,
            stop: trade.plan.stop,
            target: trade.plan.target,
            shares: trade.shares(),
            pnl: trade.pnl,
            return_pct: trade.return_pct(),
            max_loss: trade.plan.max_loss,
            max_win: trade.plan.max_win,
            notional: trade.plan.notional,
            holding_minutes: trade.holding_minutes(),
            diagnostics: trade.diagnostics,
        }
    }
}

/// What became of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalStatus {
    Executed,
    Dropped { reason: String, detail: String },
}

impl SignalStatus {
    pub fn dropped(reason: &DropReason) -> Self {
        SignalStatus::Dropped {
            reason: reason.label().to_string(),
            detail: reason.to_string(),
        }
    }
}

/// One candidate with the diagnostics attached on its way through the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub symbol: String,
    pub session_date: NaiveDate,
    pub direction: Direction,
    pub level: f64,
    pub opening_range_high: f64,
    pub opening_range_low: f64,
    pub breakout_time: String,
    pub breakout_close: f64,
    pub breakout_distance: f64,
    pub retest_time: String,
    pub retest_contact: Option<WickContact>,
    pub ignition_time: Option<String>,
    pub ignition_source: Option<IgnitionSource>,
    pub score: Option<f64>,
    pub gate: Option<GateVerdict>,
    #[serde(flatten)]
    pub status: SignalStatus,
}

impl SignalRecord {
    pub fn new(
        candidate: &Candidate,
        tz: Tz,
        score: Option<f64>,
        gate: Option<GateVerdict>,
        status: SignalStatus,
    ) -> Self {
        Self {
            symbol: candidate.symbol.clone(),
            session_date: candidate.session_date,
            direction: candidate.direction,
            level: candidate.level,
            opening_range_high: candidate.opening_range.high,
            opening_range_low: candidate.opening_range.low,
            breakout_time: present(candidate.breakout.time, tz),
            breakout_close: candidate.breakout.bar.close,
            breakout_distance: candidate.breakout_distance(),
            retest_time: present(candidate.retest.time, tz),
            retest_contact: candidate.retest.contact,
            ignition_time: candidate.ignition.as_ref().map(|i| present(i.time, tz)),
            ignition_source: candidate.ignition.as_ref().map(|i| i.source),
            score,
            gate,
            status,
        }
    }
}

/// Why the result looks the way it does.
///
/// Distinguishes "no data" (every session skipped) from "ran but nothing
/// qualified" (sessions scanned, funnel empties at some stage).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub sessions_requested: usize,
    pub sessions_skipped: BTreeMap<String, usize>,
    pub funnel: StageFunnel,
    pub trades_executed: usize,
    pub drops: BTreeMap<String, usize>,
    pub bars_dropped: HygieneReport,
}

impl RunDiagnostics {
    pub fn record_skip(&mut self, reason: &SkipReason) {
        *self.sessions_skipped.entry(reason.label().to_string()).or_default() += 1;
    }

    pub fn record_drop(&mut self, reason: &DropReason) {
        *self.drops.entry(reason.label().to_string()).or_default() += 1;
    }

    pub fn total_skipped(&self) -> usize {
        self.sessions_skipped.values().sum()
    }
}
