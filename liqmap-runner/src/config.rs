//! TOML run configuration.
//!
//! ```toml
//! [engine]
//! bucket_size = 100
//! maintenance_margin_rate = 0.004
//! same_candle_policy = "legacy"   # or "recheck"
//! doji_side = "long"              # "long", "short" or "skip"
//!
//! [[engine.weights]]
//! leverage = 10
//! fraction = 1.0
//!
//! [input]
//! alignment_tolerance_secs = 60
//!
//! [[jobs]]
//! symbol = "BTCUSDT"
//! candles = "data/btc_candles.csv"
//! open_interest = "data/btc_oi.csv"
//! ```
//!
//! Every key is optional; omitted keys take the engine defaults.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use liqmap_core::domain::Side;
use liqmap_core::engine::{
    ConfigError as EngineConfigError, DojiPolicy, EngineConfig, LeverageWeights,
    SameCandlePolicy, SideInference, TierWeight, DEFAULT_BUCKET_SIZE,
    DEFAULT_MAINTENANCE_MARGIN_RATE,
};

/// Default nearest-timestamp window for OI alignment.
pub const DEFAULT_ALIGNMENT_TOLERANCE_SECS: u64 = 60;

/// Errors from reading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("alignment tolerance of {0}s is out of range")]
    InvalidTolerance(u64),

    #[error(transparent)]
    Engine(#[from] EngineConfigError),
}

/// Top-level TOML document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapFileConfig {
    pub engine: EngineSection,
    pub input: InputSection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobSpec>,
}

/// `[engine]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub bucket_size: Decimal,
    pub maintenance_margin_rate: Decimal,
    pub same_candle_policy: SameCandlePolicy,
    pub doji_side: DojiPolicy,
    /// When set, every positive OI delta opens positions on this side and
    /// candle direction is ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_side: Option<Side>,
    pub weights: Vec<TierWeight>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
            maintenance_margin_rate: DEFAULT_MAINTENANCE_MARGIN_RATE,
            same_candle_policy: SameCandlePolicy::default(),
            doji_side: DojiPolicy::default(),
            fixed_side: None,
            weights: LeverageWeights::default().into(),
        }
    }
}

/// `[input]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSection {
    pub alignment_tolerance_secs: u64,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            alignment_tolerance_secs: DEFAULT_ALIGNMENT_TOLERANCE_SECS,
        }
    }
}

impl InputSection {
    pub fn tolerance(&self) -> Result<chrono::Duration, ConfigError> {
        i64::try_from(self.alignment_tolerance_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(ConfigError::InvalidTolerance(self.alignment_tolerance_secs))
    }
}

/// One `[[jobs]]` entry: a symbol and where its input lives.
///
/// Without `open_interest`, the candle file must carry an `oi_delta` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub symbol: String,
    pub candles: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<PathBuf>,
}

impl HeatmapFileConfig {
    /// Load and parse a TOML file. Engine settings are not validated here;
    /// call [`HeatmapFileConfig::engine_config`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build and validate the engine configuration.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let engine = &self.engine;
        let side_inference = match engine.fixed_side {
            Some(side) => SideInference::Fixed { side },
            None => SideInference::CandleDirection {
                doji: engine.doji_side,
            },
        };
        let config = EngineConfig {
            weights: LeverageWeights::new(engine.weights.clone())?,
            bucket_size: engine.bucket_size,
            maintenance_margin_rate: engine.maintenance_margin_rate,
            side_inference,
            same_candle_policy: engine.same_candle_policy,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = HeatmapFileConfig::from_toml("").unwrap();
        assert_eq!(cfg, HeatmapFileConfig::default());
        assert_eq!(cfg.engine_config().unwrap(), EngineConfig::default());
        assert_eq!(cfg.input.alignment_tolerance_secs, 60);
    }

    #[test]
    fn parses_full_document() {
        let cfg = HeatmapFileConfig::from_toml(
            r#"
            [engine]
            bucket_size = 50
            maintenance_margin_rate = 0.005
            same_candle_policy = "recheck"
            doji_side = "skip"

            [[engine.weights]]
            leverage = 10
            fraction = 0.6

            [[engine.weights]]
            leverage = 20
            fraction = 0.4

            [input]
            alignment_tolerance_secs = 300

            [[jobs]]
            symbol = "ETHUSDT"
            candles = "eth.csv"
            "#,
        )
        .unwrap();

        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.bucket_size, dec!(50));
        assert_eq!(engine.maintenance_margin_rate, dec!(0.005));
        assert_eq!(engine.same_candle_policy, SameCandlePolicy::Recheck);
        assert_eq!(
            engine.side_inference,
            SideInference::CandleDirection {
                doji: DojiPolicy::Skip
            }
        );
        assert_eq!(engine.weights.tiers(), vec![10, 20]);
        assert_eq!(cfg.input.tolerance().unwrap(), chrono::Duration::minutes(5));
        assert_eq!(cfg.jobs.len(), 1);
        assert!(cfg.jobs[0].open_interest.is_none());
    }

    #[test]
    fn fixed_side_overrides_candle_direction() {
        let cfg = HeatmapFileConfig::from_toml("[engine]\nfixed_side = \"short\"\n").unwrap();
        assert_eq!(
            cfg.engine_config().unwrap().side_inference,
            SideInference::Fixed { side: Side::Short }
        );
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let cfg = HeatmapFileConfig::from_toml(
            "[[engine.weights]]\nleverage = 10\nfraction = 0.5\n",
        )
        .unwrap();
        assert!(matches!(
            cfg.engine_config(),
            Err(ConfigError::Engine(EngineConfigError::WeightSum(_)))
        ));
    }

    #[test]
    fn invalid_bucket_size_is_rejected() {
        let cfg = HeatmapFileConfig::from_toml("[engine]\nbucket_size = 0\n").unwrap();
        assert!(matches!(
            cfg.engine_config(),
            Err(ConfigError::Engine(EngineConfigError::InvalidBucketSize(_)))
        ));
    }

    #[test]
    fn oversized_tolerance_is_rejected() {
        for secs in [u64::MAX, i64::MAX as u64, 10_000_000_000_000_000] {
            let input = InputSection {
                alignment_tolerance_secs: secs,
            };
            assert!(matches!(
                input.tolerance(),
                Err(ConfigError::InvalidTolerance(s)) if s == secs
            ));
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            HeatmapFileConfig::from_toml("[engine\nbucket_size = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn defaults_render_and_reparse() {
        let rendered = HeatmapFileConfig::default().to_toml().unwrap();
        let reparsed = HeatmapFileConfig::from_toml(&rendered).unwrap();
        assert_eq!(reparsed, HeatmapFileConfig::default());
    }
}
