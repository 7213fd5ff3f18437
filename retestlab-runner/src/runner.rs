//! Backtest driver — date iteration, session caching, gating and aggregation.
//!
//! Per symbol: for every weekday in the configured range, align the session
//! through the warm-start cache, scan it, gate level 2+ candidates and
//! simulate the survivors. Per-session failures are recorded as skip
//! reasons; only configuration problems abort a run.

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use retestlab_core::data::{BarSource, SessionAligner, SessionKey, SkipReason, WarmStartCache};
use retestlab_core::detect::Pipeline;
use retestlab_core::domain::{Outcome, RealizedTrade};
use retestlab_core::engine::{DropReason, Simulator};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{parse_time_zone, BacktestConfig, ConfigError};
use crate::gate::{CandidateScorer, QualityGate, Unscored};
use crate::metrics::SummaryMetrics;
use crate::result::{
    RunDiagnostics, SignalRecord, SignalStatus, SymbolResult, TradeRecord, SCHEMA_VERSION,
};

/// Errors that abort a run before any session is processed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("symbol '{0}' is not part of this run")]
    UnknownSymbol(String),
}

/// Runs the configured backtest against a bar source.
pub struct BacktestEngine {
    config: BacktestConfig,
    source: Arc<dyn BarSource>,
    aligner: SessionAligner,
    pipeline: Pipeline,
    simulator: Simulator,
    gate: Box<dyn QualityGate>,
    scorer: Box<dyn CandidateScorer>,
    cache: WarmStartCache,
    presentation_tz: Tz,
    config_hash: String,
}

impl BacktestEngine {
    /// Validate `config` and wire up every component. Fails fast on bad config.
    pub fn new(config: BacktestConfig, source: Arc<dyn BarSource>) -> Result<Self, RunError> {
        config.validate()?;
        let presentation_tz = parse_time_zone(&config.output.timezone)?;
        let config_hash = config.fingerprint()?;
        let level = config.backtest.level;

        Ok(Self {
            aligner: SessionAligner::new(config.session.clone()),
            pipeline: Pipeline::new(&config.pipeline_config()),
            simulator: Simulator::new(config.simulation_config(), level),
            gate: config.gate.build(),
            scorer: Box::new(Unscored),
            cache: WarmStartCache::new(),
            presentation_tz,
            config_hash,
            source,
            config,
        })
    }

    /// Attach an external candidate scorer (consumed by the quality gate).
    pub fn with_scorer(mut self, scorer: Box<dyn CandidateScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the configured gate.
    pub fn with_gate(mut self, gate: Box<dyn QualityGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn cache(&self) -> &WarmStartCache {
        &self.cache
    }

    /// Run every configured symbol, in config order.
    pub fn run(&self) -> Vec<SymbolResult> {
        self.config
            .backtest
            .symbols
            .iter()
            .map(|s| self.run_one(s))
            .collect()
    }

    /// Run a single configured symbol.
    pub fn run_symbol(&self, symbol: &str) -> Result<SymbolResult, RunError> {
        if !self.config.backtest.symbols.iter().any(|s| s == symbol) {
            return Err(RunError::UnknownSymbol(symbol.to_string()));
        }
        Ok(self.run_one(symbol))
    }

    fn run_one(&self, symbol: &str) -> SymbolResult {
        let level = self.config.backtest.level;
        let mut diagnostics = RunDiagnostics::default();
        let mut trades: Vec<RealizedTrade> = Vec::new();
        let mut signals: Vec<SignalRecord> = Vec::new();

        for date in trading_days(self.config.backtest.start_date, self.config.backtest.end_date) {
            diagnostics.sessions_requested += 1;

            let key = SessionKey::new(symbol, date);
            let session = match self.cache.get_or_build(&key, || {
                self.aligner.align(self.source.as_ref(), symbol, date)
            }) {
                Ok(session) => session,
                Err(reason) => {
                    log_skip(symbol, date, &reason);
                    diagnostics.record_skip(&reason);
                    continue;
                }
            };
            diagnostics.bars_dropped.merge(session.hygiene);

            let scan = self.pipeline.run_session(&session);
            diagnostics.funnel += scan.funnel;
            if scan.opening_range.is_none() {
                diagnostics.record_skip(&SkipReason::NoRange);
                continue;
            }

            for candidate in &scan.candidates {
                let score = self.scorer.score(candidate);
                let verdict = level
                    .uses_quality_gate()
                    .then(|| self.gate.evaluate(candidate, score));

                let outcome = match &verdict {
                    Some(v) if !v.passed() => Err(DropReason::RejectedByGate),
                    _ => self.simulator.execute(candidate, &session),
                };

                let status = match outcome {
                    Ok(trade) => {
                        trades.push(trade);
                        diagnostics.trades_executed += 1;
                        SignalStatus::Executed
                    }
                    Err(reason) => {
                        debug!(
                            symbol,
                            %date,
                            direction = %candidate.direction,
                            reason = %reason,
                            "candidate dropped"
                        );
                        diagnostics.record_drop(&reason);
                        SignalStatus::dropped(&reason)
                    }
                };
                signals.push(SignalRecord::new(
                    candidate,
                    self.presentation_tz,
                    score,
                    verdict,
                    status,
                ));
            }
        }

        let result = self.assemble(symbol, trades, signals, diagnostics);
        info!(
            symbol,
            level = %level,
            sessions = result.diagnostics.sessions_requested,
            skipped = result.diagnostics.total_skipped(),
            candidates = result.candidates,
            trades = result.total_trades,
            pnl = result.total_pnl,
            "symbol complete"
        );
        result
    }

    fn assemble(
        &self,
        symbol: &str,
        trades: Vec<RealizedTrade>,
        signals: Vec<SignalRecord>,
        diagnostics: RunDiagnostics,
    ) -> SymbolResult {
        let metrics = SummaryMetrics::compute(&trades, self.config.backtest.initial_capital);
        let count = |o: Outcome| trades.iter().filter(|t| t.outcome == o).count();

        SymbolResult {
            schema_version: SCHEMA_VERSION,
            symbol: symbol.to_string(),
            level: self.config.backtest.level,
            config_hash: self.config_hash.clone(),
            timezone: self.presentation_tz.name().to_string(),
            start_date: self.config.backtest.start_date,
            end_date: self.config.backtest.end_date,
            candidates: signals.len(),
            total_trades: trades.len(),
            winning_trades: count(Outcome::Win),
            losing_trades: count(Outcome::Loss),
            forced_closes: count(Outcome::Forced),
            total_pnl: metrics.total_pnl,
            win_rate: metrics.win_rate,
            trades: trades
                .iter()
                .map(|t| TradeRecord::from_trade(t, self.presentation_tz))
                .collect(),
            signals,
            diagnostics,
            metrics,
        }
    }
}

/// Weekdays in `[start, end]`. Exchange holidays surface as missing-data skips.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

fn log_skip(symbol: &str, date: NaiveDate, reason: &SkipReason) {
    match reason {
        SkipReason::ReadFailure(_) | SkipReason::TimeConversion => {
            warn!(symbol, %date, reason = %reason, "session skipped");
        }
        _ => debug!(symbol, %date, reason = %reason, "session skipped"),
    }
}
