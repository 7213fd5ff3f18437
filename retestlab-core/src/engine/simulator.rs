//! Simulation engine: entry timing, stop placement, sizing and the forward walk.
//!
//! Entry timing by level:
//! - Level 1: the first fine bar after the retest that closes beyond the
//!   retest close confirms; entry is the next bar's open.
//! - Level 2+: ignition found by forward search → the bar after the
//!   ignition bar; ignition from a strong retest → the anchor bar itself
//!   (it already is the bar after the retest).
//!
//! Entries at or after the scan-window end are rejected. The walk starts on
//! the entry bar and runs to the last fine bar of the session.

use super::exit::{check_bar, ExitFill};
use crate::data::{AnnotatedBar, SessionData};
use crate::detect::PipelineLevel;
use crate::domain::{
    Bar, Candidate, ContinuationDiagnostics, Direction, IgnitionSource, Outcome, RealizedTrade,
};
use crate::planner::{
    ceil_to_tick, floor_to_tick, plan_trade, PlanError, PlanRequest, StopSpec, TradePlan,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Risk and stop parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub capital: f64,
    pub risk_fraction: f64,
    pub reward_risk: f64,
    pub leverage: f64,
    pub tick_size: f64,
    /// Stop buffer as a fraction of the breakout distance beyond the level.
    pub stop_buffer_pct: f64,
    /// Per-share risk cap as a fraction of entry.
    pub max_risk_pct: f64,
    pub lot_size: u64,
    pub infer_stop_from_buying_power: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capital: 10_000.0,
            risk_fraction: 0.01,
            reward_risk: 2.0,
            leverage: 1.0,
            tick_size: 0.01,
            stop_buffer_pct: 0.005,
            max_risk_pct: 0.005,
            lot_size: 1,
            infer_stop_from_buying_power: false,
        }
    }
}

/// Why a candidate did not become a trade.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// Level 0: candidates are never executed.
    ScanOnly,
    /// No confirming bar, or no bar left to enter on.
    NoEntryBar,
    /// Entry would fall at or after the scan-window end.
    EntryAfterCutoff,
    Sizing(PlanError),
    /// Rejected by the external quality gate.
    RejectedByGate,
}

impl DropReason {
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::ScanOnly => "scan_only",
            DropReason::NoEntryBar => "no_entry_bar",
            DropReason::EntryAfterCutoff => "entry_after_cutoff",
            DropReason::Sizing(_) => "sizing",
            DropReason::RejectedByGate => "rejected_by_gate",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Sizing(e) => write!(f, "sizing: {e}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Turns candidates into realized trades.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SimulationConfig,
    level: PipelineLevel,
}

impl Simulator {
    pub fn new(config: SimulationConfig, level: PipelineLevel) -> Self {
        Self { config, level }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Execute one candidate against its session's fine bars.
    pub fn execute(
        &self,
        candidate: &Candidate,
        session: &SessionData,
    ) -> Result<RealizedTrade, DropReason> {
        if !self.level.executes() {
            return Err(DropReason::ScanOnly);
        }

        let fine = &session.fine;
        let idx = self.entry_index(candidate, fine).ok_or(DropReason::NoEntryBar)?;
        let entry_bar = fine[idx].bar;
        if entry_bar.timestamp >= session.bounds.scan_end {
            return Err(DropReason::EntryAfterCutoff);
        }

        let direction = candidate.direction;
        let entry = entry_bar.open;
        let stop = self.stop_price(candidate, entry);
        let plan = plan_trade(&PlanRequest {
            side: direction,
            entry,
            capital: self.config.capital,
            risk_fraction: self.config.risk_fraction,
            reward_risk: self.config.reward_risk,
            leverage: self.config.leverage,
            stop: Some(StopSpec::Price(stop)),
            tick_size: self.config.tick_size,
            lot_size: self.config.lot_size,
            infer_stop_from_buying_power: self.config.infer_stop_from_buying_power,
        })
        .map_err(DropReason::Sizing)?;

        let path: Vec<Bar> = fine[idx..].iter().map(|b| b.bar).collect();
        let exit = Self::walk_forward(&path, &plan).ok_or(DropReason::NoEntryBar)?;
        let pnl = (exit.price - entry) * plan.shares as f64 * direction.sign();

        debug!(
            symbol = %candidate.symbol,
            %direction,
            entry,
            stop = plan.stop,
            target = plan.target,
            shares = plan.shares,
            outcome = ?exit.outcome,
            pnl,
            "trade simulated"
        );

        Ok(RealizedTrade {
            symbol: candidate.symbol.clone(),
            session_date: candidate.session_date,
            direction,
            entry_time: entry_bar.timestamp,
            entry_price: entry,
            exit_time: exit.time,
            exit_price: exit.price,
            outcome: exit.outcome,
            pnl,
            diagnostics: continuation_diagnostics(&entry_bar, &candidate.retest.bar, &plan),
            plan,
        })
    }

    /// Walk `bars` (entry bar first) until the stop or target fires.
    ///
    /// Stop is checked before target on every bar. With neither touched the
    /// position is closed at the last bar's close as `Forced`. `None` only
    /// for an empty path.
    pub fn walk_forward(bars: &[Bar], plan: &TradePlan) -> Option<ExitFill> {
        for bar in bars {
            if let Some(fill) = check_bar(bar, plan.side, plan.stop, plan.target) {
                return Some(fill);
            }
        }
        bars.last().map(|last| ExitFill {
            time: last.timestamp,
            price: last.close,
            outcome: Outcome::Forced,
        })
    }

    /// Retest extreme pushed out by the buffer, capped at `max_risk_pct` of entry.
    ///
    /// The cap is snapped onto the tick grid toward the entry, so rounding the
    /// stop to the nearest tick later can never widen the risk past it.
    pub fn stop_price(&self, candidate: &Candidate, entry: f64) -> f64 {
        let buffer = self.config.stop_buffer_pct * candidate.breakout_distance();
        let max_risk = self.config.max_risk_pct * entry;
        let tick = self.config.tick_size;
        let retest = &candidate.retest.bar;
        match candidate.direction {
            Direction::Long => (retest.low - buffer).max(ceil_to_tick(entry - max_risk, tick)),
            Direction::Short => (retest.high + buffer).min(floor_to_tick(entry + max_risk, tick)),
        }
    }

    fn entry_index(&self, candidate: &Candidate, fine: &[AnnotatedBar]) -> Option<usize> {
        if !self.level.requires_ignition() {
            let retest = &candidate.retest;
            let confirm = fine.iter().position(|b| {
                b.bar.timestamp > retest.time
                    && candidate.direction.beyond(b.bar.close, retest.bar.close)
            })?;
            let entry = confirm + 1;
            return (entry < fine.len()).then_some(entry);
        }

        let ignition = candidate.ignition.as_ref()?;
        match ignition.source {
            IgnitionSource::RetestItself => {
                fine.iter().position(|b| b.bar.timestamp == ignition.time)
            }
            IgnitionSource::NextBar => fine.iter().position(|b| b.bar.timestamp > ignition.time),
        }
    }
}

fn continuation_diagnostics(
    entry_bar: &Bar,
    retest_bar: &Bar,
    plan: &TradePlan,
) -> ContinuationDiagnostics {
    let reward = (plan.target - plan.entry).abs();
    let progress_to_target = if reward > 0.0 {
        (entry_bar.close - plan.entry) * plan.side.sign() / reward
    } else {
        0.0
    };
    ContinuationDiagnostics {
        body_pct: entry_bar.body_pct(),
        volume_ratio: (retest_bar.volume > 0.0).then(|| entry_bar.volume / retest_bar.volume),
        progress_to_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BreakoutCandidate, OpeningRange, RetestEvent};
    use crate::planner::round_to_tick;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 14, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn plan(side: Direction, stop: f64, target: f64) -> TradePlan {
        TradePlan {
            side,
            entry: 100.0,
            stop,
            target,
            shares: 10,
            stop_distance: (100.0 - stop).abs(),
            dollar_risk: 100.0,
            max_loss: 10.0 * (100.0 - stop).abs(),
            max_win: 10.0 * (target - 100.0).abs(),
            notional: 1_000.0,
            buying_power_used: 1_000.0,
        }
    }

    fn bar(min: i64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(t(min), c, h, l, c, 100.0)
    }

    #[test]
    fn walk_stops_out_first() {
        let bars = [
            bar(0, 100.5, 99.5, 100.0),
            bar(1, 100.2, 98.9, 99.0),
            bar(2, 103.0, 99.0, 102.5),
        ];
        let fill = Simulator::walk_forward(&bars, &plan(Direction::Long, 99.0, 102.0)).unwrap();
        assert_eq!(fill.outcome, Outcome::Loss);
        assert_eq!(fill.time, t(1));
    }

    #[test]
    fn walk_reaches_target() {
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 102.1, 100.0, 102.0)];
        let fill = Simulator::walk_forward(&bars, &plan(Direction::Long, 99.0, 102.0)).unwrap();
        assert_eq!(fill.outcome, Outcome::Win);
        assert_eq!(fill.price, 102.0);
    }

    #[test]
    fn walk_forces_close_when_data_runs_out() {
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 100.8, 99.6, 100.7)];
        let fill = Simulator::walk_forward(&bars, &plan(Direction::Long, 99.0, 102.0)).unwrap();
        assert_eq!(fill.outcome, Outcome::Forced);
        assert_eq!(fill.price, 100.7);
        assert_eq!(fill.time, t(1));
    }

    #[test]
    fn walk_short_mirrors_long() {
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 100.0, 97.9, 98.0)];
        let fill = Simulator::walk_forward(&bars, &plan(Direction::Short, 101.0, 98.0)).unwrap();
        assert_eq!(fill.outcome, Outcome::Win);
    }

    #[test]
    fn empty_walk_has_no_exit() {
        assert!(Simulator::walk_forward(&[], &plan(Direction::Long, 99.0, 102.0)).is_none());
    }

    fn candidate(direction: Direction, level: f64, breakout_close: f64, retest: Bar) -> Candidate {
        let breakout = bar(5, breakout_close.max(level), breakout_close.min(level), breakout_close);
        Candidate {
            symbol: "TEST".into(),
            session_date: t(0).date_naive(),
            direction,
            level,
            opening_range: OpeningRange { high: 100.0, low: 99.0, anchor: t(0) },
            breakout: BreakoutCandidate {
                direction,
                level,
                time: t(5),
                bar: breakout,
                previous: bar(0, 100.0, 99.0, 99.5),
            },
            retest: RetestEvent { time: retest.timestamp, bar: retest, contact: None },
            ignition: None,
        }
    }

    #[test]
    fn capped_long_stop_stays_inside_cap_after_rounding() {
        let sim = Simulator::default();
        // Retest low far below entry: the 0.5% cap binds.
        let c = candidate(Direction::Long, 100.0, 101.0, bar(11, 101.3, 99.0, 101.2));
        let entry = 101.37;
        let stop = sim.stop_price(&c, entry);
        assert!((stop - 100.87).abs() < 1e-9);
        let rounded = round_to_tick(stop, 0.01);
        assert!(entry - rounded <= 0.005 * entry + 1e-9);
    }

    #[test]
    fn capped_short_stop_stays_inside_cap_after_rounding() {
        let sim = Simulator::default();
        let c = candidate(Direction::Short, 99.0, 98.0, bar(11, 100.5, 98.1, 98.2));
        let entry = 98.63;
        let stop = sim.stop_price(&c, entry);
        assert!((stop - 99.12).abs() < 1e-9);
        let rounded = round_to_tick(stop, 0.01);
        assert!(rounded - entry <= 0.005 * entry + 1e-9);
    }

    #[test]
    fn uncapped_stop_uses_buffered_retest_extreme() {
        let sim = Simulator::default();
        let c = candidate(Direction::Long, 100.0, 101.0, bar(11, 101.3, 100.9, 101.2));
        // 100.9 - 0.005 * 1.0, well inside the 0.50685 cap at this entry.
        assert!((sim.stop_price(&c, 101.37) - 100.895).abs() < 1e-9);
    }

    #[test]
    fn drop_reason_labels() {
        assert_eq!(DropReason::EntryAfterCutoff.to_string(), "entry_after_cutoff");
        let sizing = DropReason::Sizing(PlanError::MissingStop);
        assert_eq!(sizing.label(), "sizing");
        assert!(sizing.to_string().starts_with("sizing: "));
    }
}
