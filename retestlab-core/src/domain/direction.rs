//! Trade direction and the side-aware price comparisons built on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a breakout and of the trade taken on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Strictly beyond `level` in the trade direction (above for long, below for short).
    pub fn beyond(self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price > level,
            Direction::Short => price < level,
        }
    }

    /// On or beyond `level` in the trade direction.
    pub fn at_or_beyond(self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price >= level,
            Direction::Short => price <= level,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
