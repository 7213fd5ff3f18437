//! Session annotation: trailing volume average and cumulative VWAP.
//!
//! Both series are causal. The volume average at bar `t` covers bars
//! `[t - window + 1, t]` (current bar included, shorter at the start). VWAP
//! at bar `t` accumulates typical price × volume from the first current-day
//! bar through `t`.

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Default trailing window for the volume average.
pub const VOLUME_AVG_WINDOW: usize = 20;

/// A bar plus the rolling context the detectors read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedBar {
    pub bar: Bar,
    /// Trailing mean volume including this bar.
    pub volume_avg: f64,
    /// Cumulative session VWAP through this bar.
    pub vwap: f64,
}

impl AnnotatedBar {
    /// Volume relative to the trailing average, `None` if the average is zero.
    pub fn volume_ratio(&self) -> Option<f64> {
        if self.volume_avg > 0.0 {
            Some(self.bar.volume / self.volume_avg)
        } else {
            None
        }
    }
}

/// Annotate `day` using `seed` (prior-session tail) to warm the volume average.
///
/// Seed rows feed the trailing window only; VWAP restarts at the first `day`
/// bar, and the output holds exactly one row per `day` bar.
pub fn annotate(seed: &[Bar], day: &[Bar], window: usize) -> Vec<AnnotatedBar> {
    let window = window.max(1);
    let volumes: Vec<f64> = seed.iter().chain(day).map(|b| b.volume).collect();
    let offset = seed.len();

    let mut out = Vec::with_capacity(day.len());
    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;

    for (i, bar) in day.iter().enumerate() {
        let end = offset + i + 1;
        let start = end.saturating_sub(window);
        let trailing = &volumes[start..end];
        let volume_avg = trailing.iter().sum::<f64>() / trailing.len() as f64;

        pv_sum += bar.typical_price() * bar.volume;
        vol_sum += bar.volume;
        let vwap = if vol_sum > 0.0 {
            pv_sum / vol_sum
        } else {
            bar.typical_price()
        };

        out.push(AnnotatedBar {
            bar: *bar,
            volume_avg,
            vwap,
        });
    }
    out
}

/// Median volume over a slice of annotated bars (0.0 when empty).
pub fn median_volume(bars: &[AnnotatedBar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let mut vols: Vec<f64> = bars.iter().map(|b| b.bar.volume).collect();
    vols.sort_by(|a, b| a.total_cmp(b));
    let mid = vols.len() / 2;
    if vols.len() % 2 == 0 {
        (vols[mid - 1] + vols[mid]) / 2.0
    } else {
        vols[mid]
    }
}
