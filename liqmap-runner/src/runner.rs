//! Heatmap runner: wires together input loading, the engine, and fingerprinting.
//!
//! Entry points:
//! - `run_from_data()`: engine run on pre-loaded input, no I/O.
//! - `run_job()`: loads one job's files, then runs.
//! - `run_jobs()`: runs independent jobs in parallel, one ledger per job.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use liqmap_core::domain::{Candle, Snapshot};
use liqmap_core::engine::{run_heatmap, EngineConfig, EngineError, SimulationTotals};
use liqmap_core::fingerprint::RunFingerprint;

use crate::config::{ConfigError, HeatmapFileConfig, JobSpec};
use crate::data_loader::{load_input, InputSource, LoadError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("engine error for '{symbol}': {source}")]
    Engine {
        symbol: String,
        #[source]
        source: EngineError,
    },

    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one symbol's heatmap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapRun {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub fingerprint: RunFingerprint,
    pub config: EngineConfig,
    pub candle_count: usize,
    /// Candles whose OI delta was forced to 0 for lack of a nearby sample.
    #[serde(default)]
    pub unmatched_oi: usize,
    pub totals: SimulationTotals,
    pub final_active_positions: usize,
    pub final_active_volume: Decimal,
    pub snapshots: Vec<Snapshot>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl HeatmapRun {
    pub fn symbol(&self) -> &str {
        &self.fingerprint.symbol
    }

    /// Most recent snapshot, if the run processed any candle.
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}

impl JobSpec {
    pub fn input_source(&self) -> InputSource {
        match &self.open_interest {
            Some(oi) => InputSource::CandlesAndOi {
                candles: self.candles.clone(),
                open_interest: oi.clone(),
            },
            None => InputSource::CandlesWithDeltas(self.candles.clone()),
        }
    }
}

/// Run the engine on pre-loaded input.
pub fn run_from_data(
    symbol: &str,
    candles: &[Candle],
    oi_deltas: &[Decimal],
    config: &EngineConfig,
) -> Result<HeatmapRun, RunError> {
    let fingerprint = RunFingerprint::compute(symbol, config, candles, oi_deltas)?;
    let output = run_heatmap(candles, oi_deltas, symbol, config).map_err(|source| {
        error!(symbol, error = %source, "heatmap run aborted");
        RunError::Engine {
            symbol: symbol.to_string(),
            source,
        }
    })?;

    Ok(HeatmapRun {
        schema_version: SCHEMA_VERSION,
        fingerprint,
        config: config.clone(),
        candle_count: candles.len(),
        unmatched_oi: 0,
        totals: output.totals,
        final_active_positions: output.final_active_positions,
        final_active_volume: output.final_active_volume,
        snapshots: output.snapshots,
    })
}

/// Load one job's input and run it.
pub fn run_job(job: &JobSpec, file_config: &HeatmapFileConfig) -> Result<HeatmapRun, RunError> {
    let config = file_config.engine_config()?;
    let tolerance = file_config.input.tolerance()?;
    let input = load_input(&job.input_source(), tolerance)?;
    info!(
        symbol = %job.symbol,
        candles = input.candles.len(),
        unmatched_oi = input.unmatched_oi,
        "loaded input"
    );

    let mut run = run_from_data(&job.symbol, &input.candles, &input.oi_deltas, &config)?;
    run.unmatched_oi = input.unmatched_oi;
    Ok(run)
}

/// Run every job on the rayon pool. Jobs share nothing; results come back
/// in job order, each with its own outcome.
pub fn run_jobs(
    jobs: &[JobSpec],
    file_config: &HeatmapFileConfig,
) -> Vec<(String, Result<HeatmapRun, RunError>)> {
    jobs.par_iter()
        .map(|job| (job.symbol.clone(), run_job(job, file_config)))
        .collect()
}
