//! Bar — the fundamental market data unit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minutes covered by one coarse (breakout-resolution) bar.
pub const COARSE_BAR_MINUTES: i64 = 5;

/// Minutes covered by one fine (retest/simulation-resolution) bar.
pub const FINE_BAR_MINUTES: i64 = 1;

/// OHLCV bar for a single symbol, stamped with its UTC open time.
///
/// Bars are immutable once read. Every comparison inside the engine is done
/// on the UTC timestamp; exchange-local wall clock only appears when session
/// bounds are derived (see `data::session`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLCV field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// OHLC ordering check: high >= max(open, close) >= min(open, close) >= low, volume >= 0.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.volume >= 0.0
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Absolute open-to-close distance.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Body as a fraction of range. A zero-range bar has no body strength.
    pub fn body_pct(&self) -> f64 {
        let range = self.range();
        if range <= 0.0 {
            return 0.0;
        }
        self.body() / range
    }

    /// Where the close sits inside the range: 0.0 at the low, 1.0 at the high.
    pub fn close_position(&self) -> f64 {
        let range = self.range();
        if range <= 0.0 {
            return 0.0;
        }
        (self.close - self.low) / range
    }

    /// Typical price used for VWAP: (H + L + C) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// The two bar resolutions the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// 5-minute bars: opening range and breakout detection.
    Coarse,
    /// 1-minute bars: retest, ignition and trade simulation.
    Fine,
}

impl Granularity {
    pub fn duration(self) -> Duration {
        match self {
            Granularity::Coarse => Duration::minutes(COARSE_BAR_MINUTES),
            Granularity::Fine => Duration::minutes(FINE_BAR_MINUTES),
        }
    }
}
