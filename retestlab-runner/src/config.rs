//! Serializable backtest configuration.
//!
//! Loaded from TOML; every section but `[backtest]` is optional and falls
//! back to the defaults of the core component it configures. Validation is
//! a hard failure at startup, never per session.

use chrono::NaiveDate;
use chrono_tz::Tz;
use retestlab_core::data::SessionWindow;
use retestlab_core::detect::{
    BreakoutRules, IgnitionRules, PipelineConfig, PipelineLevel, RetestRule,
};
use retestlab_core::engine::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::gate::GateConfig;

/// Configuration errors. All are fatal before any session runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),

    #[error("invalid gate config: {0}")]
    Gate(String),
}

/// Complete configuration for a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub session: SessionWindow,
    #[serde(default)]
    pub breakout: BreakoutRules,
    #[serde(default)]
    pub retest: RetestRule,
    #[serde(default)]
    pub ignition: IgnitionRules,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub gate: GateConfig,
}

/// `[backtest]`: what to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_level")]
    pub level: PipelineLevel,
}

fn default_initial_capital() -> f64 {
    10_000.0
}

fn default_level() -> PipelineLevel {
    PipelineLevel::EXECUTE
}

/// `[risk]`: sizing and stop placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub risk_fraction: f64,
    pub reward_risk: f64,
    pub leverage: f64,
    pub tick_size: f64,
    pub stop_buffer_pct: f64,
    pub max_risk_pct: f64,
    /// Buying-power share cap is rounded down to whole lots.
    pub lot_size: u64,
    pub infer_stop_from_buying_power: bool,
}

impl Default for RiskSection {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            risk_fraction: sim.risk_fraction,
            reward_risk: sim.reward_risk,
            leverage: sim.leverage,
            tick_size: sim.tick_size,
            stop_buffer_pct: sim.stop_buffer_pct,
            max_risk_pct: sim.max_risk_pct,
            lot_size: sim.lot_size,
            infer_stop_from_buying_power: sim.infer_stop_from_buying_power,
        }
    }
}

/// `[output]`: presentation of the result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// IANA name or US abbreviation (PT, ET, PDT, ...).
    pub timezone: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            timezone: "America/Los_Angeles".to_string(),
        }
    }
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Deterministic content hash of the canonical JSON form.
    ///
    /// Two runs with identical configs share a fingerprint; it is recorded
    /// in every result document.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        ensure(!b.symbols.is_empty(), "backtest.symbols must not be empty")?;
        ensure(
            b.symbols.iter().all(|s| !s.trim().is_empty()),
            "backtest.symbols must not contain blank entries",
        )?;
        ensure(b.start_date <= b.end_date, "backtest.start_date must be <= end_date")?;
        ensure(positive(b.initial_capital), "backtest.initial_capital must be > 0")?;

        let r = &self.risk;
        ensure(
            r.risk_fraction > 0.0 && r.risk_fraction < 1.0,
            "risk.risk_fraction must be in (0, 1)",
        )?;
        ensure(positive(r.reward_risk), "risk.reward_risk must be > 0")?;
        ensure(positive(r.leverage), "risk.leverage must be > 0")?;
        ensure(positive(r.tick_size), "risk.tick_size must be > 0")?;
        ensure(r.stop_buffer_pct >= 0.0, "risk.stop_buffer_pct must be >= 0")?;
        ensure(positive(r.max_risk_pct), "risk.max_risk_pct must be > 0")?;
        ensure(r.lot_size >= 1, "risk.lot_size must be >= 1")?;

        let s = &self.session;
        ensure(s.end > s.start, "session.end must be after session.start")?;
        ensure(s.scan_window_minutes > 0, "session.scan_window_minutes must be > 0")?;
        ensure(
            s.late_open_tolerance_minutes >= 0,
            "session.late_open_tolerance_minutes must be >= 0",
        )?;
        ensure(s.volume_avg_window > 0, "session.volume_avg_window must be > 0")?;

        let br = &self.breakout;
        ensure(
            (0.0..=1.0).contains(&br.min_body_pct),
            "breakout.min_body_pct must be in [0, 1]",
        )?;
        ensure(br.volume_ratio >= 0.0, "breakout.volume_ratio must be >= 0")?;

        if let RetestRule::WickTolerant {
            tolerance_bps,
            pierce_max_bps,
            ..
        } = &self.retest
        {
            ensure(*tolerance_bps >= 0.0, "retest.tolerance_bps must be >= 0")?;
            ensure(
                pierce_max_bps.map_or(true, |cap| cap >= 0.0),
                "retest.pierce_max_bps must be >= 0",
            )?;
        }

        let ig = &self.ignition;
        ensure(ig.lookahead_minutes >= 1, "ignition.lookahead_minutes must be >= 1")?;
        ensure(
            (0.0..=1.0).contains(&ig.retest_min_body_pct),
            "ignition.retest_min_body_pct must be in [0, 1]",
        )?;

        parse_time_zone(&self.output.timezone)?;
        self.gate.validate()?;
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            level: self.backtest.level,
            breakout: self.breakout.clone(),
            retest: self.retest.clone(),
            ignition: self.ignition.clone(),
            tick_size: self.risk.tick_size,
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            capital: self.backtest.initial_capital,
            risk_fraction: self.risk.risk_fraction,
            reward_risk: self.risk.reward_risk,
            leverage: self.risk.leverage,
            tick_size: self.risk.tick_size,
            stop_buffer_pct: self.risk.stop_buffer_pct,
            max_risk_pct: self.risk.max_risk_pct,
            lot_size: self.risk.lot_size,
            infer_stop_from_buying_power: self.risk.infer_stop_from_buying_power,
        }
    }
}

/// Resolve a presentation time zone.
///
/// Accepts IANA names plus the US abbreviations; seasonal variants map to
/// the same zone, so "PST" and "PDT" both follow Los Angeles DST rules.
pub fn parse_time_zone(name: &str) -> Result<Tz, ConfigError> {
    let trimmed = name.trim();
    let tz = match trimmed.to_ascii_uppercase().as_str() {
        "PT" | "PST" | "PDT" => chrono_tz::America::Los_Angeles,
        "MT" | "MST" | "MDT" => chrono_tz::America::Denver,
        "CT" | "CST" | "CDT" => chrono_tz::America::Chicago,
        "ET" | "EST" | "EDT" => chrono_tz::America::New_York,
        "UTC" | "Z" => chrono_tz::UTC,
        _ => trimmed
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimeZone(name.to_string()))?,
    };
    Ok(tz)
}

fn ensure(cond: bool, msg: &str) -> Result<(), ConfigError> {
    if cond {
        Ok(())
    } else {
        Err(ConfigError::Invalid(msg.to_string()))
    }
}

fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}
