//! Run fingerprinting: deterministic identification of a heatmap run.
//!
//! - `ConfigHash`: BLAKE3 of the canonical JSON form of an `EngineConfig`.
//! - `DatasetHash`: BLAKE3 over the candle/OI-delta input sequence.
//! - `RunFingerprint`: both hashes plus the symbol, stored alongside exported runs.
//!
//! Two runs with equal fingerprints produce identical snapshot sequences.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Candle;
use crate::engine::EngineConfig;

/// Hex-encoded BLAKE3 hash of an engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

/// Hex-encoded BLAKE3 hash of an input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash the configuration's JSON form. Field order is fixed by the struct
/// definitions, so equal configs always hash equally.
pub fn config_hash(config: &EngineConfig) -> Result<ConfigHash, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, config)?;
    Ok(ConfigHash(hasher.finalize().to_hex().to_string()))
}

/// Hash the input sequence as given (before any re-sorting).
///
/// Decimals are normalized first so `100.0` and `100` hash equally.
pub fn dataset_hash(candles: &[Candle], oi_deltas: &[Decimal]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(candles.len() as u64).to_le_bytes());
    for candle in candles {
        hasher.update(&candle.open_time.timestamp_millis().to_le_bytes());
        for price in [candle.open, candle.high, candle.low, candle.close] {
            hasher.update(price.normalize().to_string().as_bytes());
            hasher.update(b"|");
        }
    }
    hasher.update(&(oi_deltas.len() as u64).to_le_bytes());
    for delta in oi_deltas {
        hasher.update(delta.normalize().to_string().as_bytes());
        hasher.update(b"|");
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Identity of one run: what was computed, over which data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub symbol: String,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
}

impl RunFingerprint {
    pub fn compute(
        symbol: &str,
        config: &EngineConfig,
        candles: &[Candle],
        oi_deltas: &[Decimal],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            symbol: symbol.to_string(),
            config_hash: config_hash(config)?,
            dataset_hash: dataset_hash(candles, oi_deltas),
        })
    }

    /// Short combined identifier, handy for file names and log lines.
    pub fn run_id(&self) -> String {
        let combined = blake3::hash(
            format!("{}:{}:{}", self.symbol, self.config_hash, self.dataset_hash).as_bytes(),
        );
        combined.to_hex()[..16].to_string()
    }
}
