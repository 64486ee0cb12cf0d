//! Resumable heatmap simulator: one ledger, fed one candle at a time.
//!
//! The batch entry point (`loop_runner`) drives a simulator over a sorted
//! input sequence. Live callers can hold a simulator and feed it new candles
//! as they close; lifecycle state carries over between calls.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::domain::{Candle, DomainError, Snapshot};

use super::aggregator::aggregate;
use super::config::{ConfigError, EngineConfig};
use super::distributor::LeverageDistributor;
use super::ledger::PositionLedger;
use super::processor::{process_with, CandleOutcome};

/// Errors that abort a heatmap run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("candles and OI deltas differ in length ({candles} vs {oi_deltas})")]
    LengthMismatch { candles: usize, oi_deltas: usize },

    /// `index` is the step number when streaming and the input position in
    /// a batch run.
    #[error("malformed candle at index {index} (open_time {open_time})")]
    MalformedCandle {
        index: usize,
        open_time: DateTime<Utc>,
    },

    #[error("candle at {open_time} precedes last processed candle at {last}")]
    OutOfOrder {
        open_time: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("liquidation price {price} cannot be bucketed with bucket size {bucket_size}")]
    BucketOverflow { price: Decimal, bucket_size: Decimal },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Running counters across all steps of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulationTotals {
    pub steps: usize,
    pub positions_created: usize,
    pub positions_consumed: usize,
    /// Positions removed as dust by proportional closure.
    pub positions_dropped: usize,
}

/// Snapshot plus the per-position detail behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub snapshot: Snapshot,
    pub outcome: CandleOutcome,
}

/// Stateful simulator for a single symbol.
///
/// Not meant to be shared between threads while stepping: `step` takes
/// `&mut self`. Run separate simulators for separate symbols.
#[derive(Debug, Clone)]
pub struct HeatmapSimulator {
    symbol: String,
    config: EngineConfig,
    distributor: LeverageDistributor,
    ledger: PositionLedger,
    last_open_time: Option<DateTime<Utc>>,
    totals: SimulationTotals,
}

impl HeatmapSimulator {
    /// Create a simulator with an empty ledger. The configuration is
    /// validated once here.
    pub fn new(symbol: impl Into<String>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let distributor = LeverageDistributor::from_config(&config);
        Ok(Self {
            symbol: symbol.into(),
            config,
            distributor,
            ledger: PositionLedger::new(),
            last_open_time: None,
            totals: SimulationTotals::default(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn totals(&self) -> SimulationTotals {
        self.totals
    }

    pub fn last_open_time(&self) -> Option<DateTime<Utc>> {
        self.last_open_time
    }

    /// Process one candle and return the resulting snapshot.
    pub fn step(&mut self, candle: &Candle, oi_delta: Decimal) -> Result<Snapshot, EngineError> {
        self.step_detailed(candle, oi_delta).map(|r| r.snapshot)
    }

    /// Process one candle, returning the snapshot together with the consumed
    /// and created positions.
    pub fn step_detailed(
        &mut self,
        candle: &Candle,
        oi_delta: Decimal,
    ) -> Result<StepReport, EngineError> {
        if !candle.is_sane() {
            error!(
                symbol = %self.symbol,
                step = self.totals.steps,
                open_time = %candle.open_time,
                "malformed candle, aborting run"
            );
            return Err(EngineError::MalformedCandle {
                index: self.totals.steps,
                open_time: candle.open_time,
            });
        }
        if let Some(last) = self.last_open_time {
            if candle.open_time < last {
                return Err(EngineError::OutOfOrder {
                    open_time: candle.open_time,
                    last,
                });
            }
        }

        let outcome = process_with(
            candle,
            oi_delta,
            &mut self.ledger,
            &self.config,
            &self.distributor,
        )?;

        let snapshot = aggregate(
            candle.open_time,
            &self.symbol,
            &self.ledger,
            outcome.created.len(),
            outcome.consumed.len(),
            self.config.bucket_size,
        )?;

        self.last_open_time = Some(candle.open_time);
        self.totals.steps += 1;
        self.totals.positions_created += outcome.created.len();
        self.totals.positions_consumed += outcome.consumed.len();
        self.totals.positions_dropped += outcome.closure.map_or(0, |c| c.positions_dropped);

        Ok(StepReport { snapshot, outcome })
    }
}
