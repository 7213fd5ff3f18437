//! RetestLab Runner — configuration, backtest driver, result documents, metrics.
//!
//! This crate builds on `retestlab-core` to provide:
//! - TOML configuration with validation and blake3 fingerprinting
//! - The per-symbol backtest driver with warm-start caching
//! - The level 2+ quality gate seam
//! - Presentation-zone result documents and summary metrics

pub mod config;
pub mod gate;
pub mod logging;
pub mod metrics;
pub mod result;
pub mod runner;

pub use config::{parse_time_zone, BacktestConfig, ConfigError};
pub use gate::{CandidateScorer, GateConfig, GateVerdict, MinScoreGate, PassThrough, QualityGate};
pub use logging::init_logging;
pub use metrics::SummaryMetrics;
pub use result::{
    RunDiagnostics, SignalRecord, SignalStatus, SymbolResult, TradeRecord, SCHEMA_VERSION,
};
pub use runner::{trading_days, BacktestEngine, RunError};
