//! Summary metrics — pure functions over the realized trade list.
//!
//! Every metric takes trades in chronological order; none depends on the
//! runner, the data layer or the engine.

use retestlab_core::domain::{Outcome, RealizedTrade};
use serde::{Deserialize, Serialize};

/// Aggregate statistics for one symbol's trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_pnl: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
    /// Largest peak-to-trough drop of cumulative P&L, in dollars (<= 0).
    pub max_drawdown: f64,
    /// Same drop as a fraction of the running equity peak (<= 0).
    pub max_drawdown_pct: f64,
}

impl SummaryMetrics {
    pub fn compute(trades: &[RealizedTrade], initial_capital: f64) -> Self {
        let pnl_path = cumulative_pnl(trades);
        let equity: Vec<f64> = std::iter::once(initial_capital)
            .chain(pnl_path.iter().map(|p| initial_capital + p))
            .collect();
        Self {
            total_pnl: total_pnl(trades),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            expectancy: mean_f64(&trades.iter().map(|t| t.pnl).collect::<Vec<_>>()),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_losing_streak: avg_losing_streak(trades),
            max_drawdown: max_drawdown_abs(&pnl_path),
            max_drawdown_pct: max_drawdown(&equity),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_pnl(trades: &[RealizedTrade]) -> f64 {
    trades.iter().map(|t| t.pnl).sum()
}

/// Running sum of trade P&L.
pub fn cumulative_pnl(trades: &[RealizedTrade]) -> Vec<f64> {
    trades
        .iter()
        .scan(0.0, |acc, t| {
            *acc += t.pnl;
            Some(*acc)
        })
        .collect()
}

/// Wins over all trades; forced closes count as non-wins.
pub fn win_rate(trades: &[RealizedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit / gross loss, capped at 100.
pub fn profit_factor(trades: &[RealizedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn avg_win(trades: &[RealizedTrade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect();
    mean_f64(&wins)
}

/// Mean losing P&L (negative, or 0 when there are no losers).
pub fn avg_loss(trades: &[RealizedTrade]) -> f64 {
    let losses: Vec<f64> = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).collect();
    mean_f64(&losses)
}

/// Maximum drawdown of an equity curve as a fraction (<= 0).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Maximum drawdown of a cumulative P&L path in dollars (<= 0).
///
/// The path implicitly starts at zero, so a first-trade loss is a drawdown.
pub fn max_drawdown_abs(pnl_path: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for &p in pnl_path {
        peak = peak.max(p);
        max_dd = max_dd.min(p - peak);
    }
    max_dd
}

/// Mean length of consecutive losing streaks. Only stop-outs count as losses.
pub fn avg_losing_streak(trades: &[RealizedTrade]) -> f64 {
    let mut streaks: Vec<usize> = Vec::new();
    let mut current = 0;

    for trade in trades {
        if trade.outcome == Outcome::Loss {
            current += 1;
        } else {
            if current > 0 {
                streaks.push(current);
            }
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }

    if streaks.is_empty() {
        return 0.0;
    }
    streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Longest run of wins (`winners = true`) or stop-outs (`winners = false`).
/// A forced close breaks either streak.
fn max_consecutive(trades: &[RealizedTrade], winners: bool) -> usize {
    let wanted = if winners { Outcome::Win } else { Outcome::Loss };
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.outcome == wanted {
            current += 1;
            if current > max_streak {
                max_streak = current;
            }
        } else {
            current = 0;
        }
    }
    max_streak
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
