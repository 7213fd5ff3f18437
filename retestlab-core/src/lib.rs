//! RetestLab Core — opening-range breakout / retest detection and trade simulation.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, directions, setup artifacts, trades)
//! - Bar-source seam, session alignment and the warm-start cache
//! - Four detection stages chained by a level-aware pipeline
//! - Risk-based trade planner
//! - Simulation engine with stop-first bracket exits

pub mod data;
pub mod detect;
pub mod domain;
pub mod engine;
pub mod planner;
