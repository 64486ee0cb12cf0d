//! Engine configuration: leverage weight table, bucket size, maintenance margin,
//! and the two explicit policy switches.
//!
//! Configuration is always passed into the engine as a value. There are no
//! module-level defaults that a run can mutate, so differently tuned runs can
//! execute side by side.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::side_inference::SideInference;

/// Weight sums within this distance of 1 are accepted.
pub const WEIGHT_SUM_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Default maintenance margin rate (0.4%).
pub const DEFAULT_MAINTENANCE_MARGIN_RATE: Decimal = Decimal::from_parts(4, 0, 0, false, 3);

/// Default price bucket width.
pub const DEFAULT_BUCKET_SIZE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("leverage weight table is empty")]
    EmptyWeights,

    #[error("leverage tier {0} must be a positive multiplier")]
    InvalidTier(u32),

    #[error("leverage tier {0} appears more than once")]
    DuplicateLeverage(u32),

    #[error("weight for leverage {leverage} is negative ({fraction})")]
    NegativeWeight { leverage: u32, fraction: Decimal },

    #[error("leverage weights must sum to 1.0, got {0}")]
    WeightSum(Decimal),

    #[error("bucket size must be positive, got {0}")]
    InvalidBucketSize(Decimal),

    #[error("maintenance margin rate must be in [0, 1), got {0}")]
    InvalidMaintenanceMargin(Decimal),
}

/// One row of the leverage weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWeight {
    pub leverage: u32,
    pub fraction: Decimal,
}

impl TierWeight {
    pub fn new(leverage: u32, fraction: Decimal) -> Self {
        Self { leverage, fraction }
    }
}

/// Ordered leverage weight table whose fractions sum to 1.
///
/// The table also defines the tier set: every listed leverage (including
/// zero-weight rows) is a valid tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TierWeight>", into = "Vec<TierWeight>")]
pub struct LeverageWeights {
    rows: Vec<TierWeight>,
}

impl LeverageWeights {
    pub fn new(rows: Vec<TierWeight>) -> Result<Self, ConfigError> {
        if rows.is_empty() {
            return Err(ConfigError::EmptyWeights);
        }
        let mut seen = Vec::with_capacity(rows.len());
        let mut sum = Decimal::ZERO;
        for row in &rows {
            if row.leverage == 0 {
                return Err(ConfigError::InvalidTier(row.leverage));
            }
            if seen.contains(&row.leverage) {
                return Err(ConfigError::DuplicateLeverage(row.leverage));
            }
            if row.fraction.is_sign_negative() && !row.fraction.is_zero() {
                return Err(ConfigError::NegativeWeight {
                    leverage: row.leverage,
                    fraction: row.fraction,
                });
            }
            seen.push(row.leverage);
            sum += row.fraction;
        }
        if (sum - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(Self { rows })
    }

    /// Rows in configured order.
    pub fn rows(&self) -> &[TierWeight] {
        &self.rows
    }

    /// The tier set, in configured order.
    pub fn tiers(&self) -> Vec<u32> {
        self.rows.iter().map(|r| r.leverage).collect()
    }

    pub fn fraction_for(&self, leverage: u32) -> Option<Decimal> {
        self.rows
            .iter()
            .find(|r| r.leverage == leverage)
            .map(|r| r.fraction)
    }
}

impl Default for LeverageWeights {
    /// 5x→15%, 10x→30%, 25x→25%, 50x→20%, 100x→10%.
    fn default() -> Self {
        Self {
            rows: vec![
                TierWeight::new(5, Decimal::new(15, 2)),
                TierWeight::new(10, Decimal::new(30, 2)),
                TierWeight::new(25, Decimal::new(25, 2)),
                TierWeight::new(50, Decimal::new(20, 2)),
                TierWeight::new(100, Decimal::new(10, 2)),
            ],
        }
    }
}

impl TryFrom<Vec<TierWeight>> for LeverageWeights {
    type Error = ConfigError;

    fn try_from(rows: Vec<TierWeight>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<LeverageWeights> for Vec<TierWeight> {
    fn from(weights: LeverageWeights) -> Self {
        weights.rows
    }
}

/// Whether positions created from a candle are checked against that same
/// candle's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameCandlePolicy {
    /// Consumption runs before creation; new positions first meet the next
    /// candle. Reproduces historical output.
    #[default]
    Legacy,
    /// After creation, new positions are checked against the same candle and
    /// consumed immediately if its range already touches their level.
    Recheck,
}

/// Configuration for a heatmap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: LeverageWeights,
    /// Width of a heatmap price bucket.
    pub bucket_size: Decimal,
    pub maintenance_margin_rate: Decimal,
    pub side_inference: SideInference,
    pub same_candle_policy: SameCandlePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: LeverageWeights::default(),
            bucket_size: DEFAULT_BUCKET_SIZE,
            maintenance_margin_rate: DEFAULT_MAINTENANCE_MARGIN_RATE,
            side_inference: SideInference::default(),
            same_candle_policy: SameCandlePolicy::Legacy,
        }
    }
}

impl EngineConfig {
    pub fn with_bucket_size(bucket_size: Decimal) -> Self {
        Self {
            bucket_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        LeverageWeights::new(self.weights.rows().to_vec())?;
        if self.bucket_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidBucketSize(self.bucket_size));
        }
        if self.maintenance_margin_rate < Decimal::ZERO
            || self.maintenance_margin_rate >= Decimal::ONE
        {
            return Err(ConfigError::InvalidMaintenanceMargin(
                self.maintenance_margin_rate,
            ));
        }
        Ok(())
    }
}
