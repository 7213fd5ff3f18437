//! Trade planner — risk-based position sizing.
//!
//! Pure function of its inputs: dollar risk is a fixed fraction of capital,
//! buying power (capital × leverage) caps the share count, and the target is
//! a reward:risk multiple of the stop distance.
//!
//! # Formula
//! ```text
//! dollar_risk    = capital * risk_fraction
//! max_shares_bp  = floor(capital * leverage / entry), rounded down to lot_size
//! shares         = min(floor(dollar_risk / stop_distance), max_shares_bp)
//! ```
//! Without a stop, full buying power is deployed and the stop distance is
//! inferred as `dollar_risk / shares` (when permitted).
//!
//! Stop and target are rounded to the tick after they are computed, and the
//! stop distance, max loss and max win are then re-derived from the rounded
//! prices so every reported number agrees with the prices actually used.
//! Leverage only raises the notional cap; it never scales dollar risk.

use crate::domain::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the caller expresses the protective stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSpec {
    Price(f64),
    Distance(f64),
}

/// Inputs to [`plan_trade`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub side: Direction,
    pub entry: f64,
    pub capital: f64,
    pub risk_fraction: f64,
    pub reward_risk: f64,
    pub leverage: f64,
    pub stop: Option<StopSpec>,
    pub tick_size: f64,
    /// Buying-power share cap is a whole number of lots.
    pub lot_size: u64,
    /// Deploy full buying power and infer the stop when none is given.
    pub infer_stop_from_buying_power: bool,
}

/// A sized trade with rounded stop/target prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub side: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub shares: u64,
    pub stop_distance: f64,
    pub dollar_risk: f64,
    pub max_loss: f64,
    pub max_win: f64,
    pub notional: f64,
    pub buying_power_used: f64,
}

/// Why a plan could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("invalid planner input: {0}")]
    InvalidInput(String),

    #[error("stop distance must be positive (got {0})")]
    NonPositiveStopDistance(f64),

    #[error("stop too tight or insufficient buying power: 0 shares")]
    StopTooTightOrInsufficientBuyingPower,

    #[error("insufficient buying power for a single share")]
    InsufficientBuyingPower,

    #[error("no stop provided and buying-power inference disabled")]
    MissingStop,
}

/// Round a price to the nearest tick, scrubbing float noise past 10 decimals.
pub fn round_to_tick(price: f64, tick: f64) -> f64 {
    scrub((price / tick).round() * tick)
}

/// Smallest tick-grid price at or above `price`.
pub fn ceil_to_tick(price: f64, tick: f64) -> f64 {
    scrub((price / tick - TICK_EPS).ceil() * tick)
}

/// Largest tick-grid price at or below `price`.
pub fn floor_to_tick(price: f64, tick: f64) -> f64 {
    scrub((price / tick + TICK_EPS).floor() * tick)
}

/// Fraction of a tick treated as float noise when snapping to the grid.
const TICK_EPS: f64 = 1e-9;

fn scrub(price: f64) -> f64 {
    (price * 1e10).round() / 1e10
}

/// Size a trade. See module docs for the formula.
pub fn plan_trade(req: &PlanRequest) -> Result<TradePlan, PlanError> {
    validate(req)?;

    let dollar_risk = req.capital * req.risk_fraction;
    let max_shares_bp = (req.capital * req.leverage / req.entry).floor() as u64;
    let max_shares_bp = max_shares_bp / req.lot_size * req.lot_size;

    let raw_distance = req.stop.map(|spec| match spec {
        StopSpec::Distance(d) => d,
        StopSpec::Price(p) => match req.side {
            Direction::Long => req.entry - p,
            Direction::Short => p - req.entry,
        },
    });

    let (shares, distance) = match raw_distance {
        Some(d) => {
            if !(d > 0.0) {
                return Err(PlanError::NonPositiveStopDistance(d));
            }
            let by_risk = (dollar_risk / d).floor() as u64;
            let shares = by_risk.min(max_shares_bp);
            if shares == 0 {
                return Err(PlanError::StopTooTightOrInsufficientBuyingPower);
            }
            (shares, d)
        }
        None => {
            if !req.infer_stop_from_buying_power {
                return Err(PlanError::MissingStop);
            }
            if max_shares_bp == 0 {
                return Err(PlanError::InsufficientBuyingPower);
            }
            (max_shares_bp, dollar_risk / max_shares_bp as f64)
        }
    };

    let sign = req.side.sign();
    let stop = round_to_tick(req.entry - sign * distance, req.tick_size);
    let target = round_to_tick(req.entry + sign * req.reward_risk * distance, req.tick_size);

    // A stop rounded onto the entry price leaves only float noise.
    let stop_distance = sign * (req.entry - stop);
    if !(stop_distance > MIN_STOP_DISTANCE) {
        return Err(PlanError::NonPositiveStopDistance(stop_distance.max(0.0)));
    }

    let qty = shares as f64;
    let notional = qty * req.entry;
    Ok(TradePlan {
        side: req.side,
        entry: req.entry,
        stop,
        target,
        shares,
        stop_distance,
        dollar_risk,
        max_loss: qty * stop_distance,
        max_win: qty * (target - req.entry).abs(),
        notional,
        buying_power_used: notional / req.leverage,
    })
}

const MIN_STOP_DISTANCE: f64 = 1e-9;

fn validate(req: &PlanRequest) -> Result<(), PlanError> {
    let checks = [
        (req.entry > 0.0, "entry must be > 0"),
        (req.capital > 0.0, "capital must be > 0"),
        (
            req.risk_fraction > 0.0 && req.risk_fraction < 1.0,
            "risk_fraction must be in (0, 1)",
        ),
        (req.reward_risk > 0.0, "reward_risk must be > 0"),
        (req.leverage > 0.0, "leverage must be > 0"),
        (req.tick_size > 0.0, "tick_size must be > 0"),
        (req.lot_size > 0, "lot_size must be >= 1"),
    ];
    match checks.iter().find(|(ok, _)| !ok) {
        Some((_, msg)) => Err(PlanError::InvalidInput((*msg).to_string())),
        None => Ok(()),
    }
}
