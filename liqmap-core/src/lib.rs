//! liqmap core: domain types, the liquidation heatmap engine, run fingerprinting.
//!
//! - Domain types (candles, sides, leverage tiers, positions, snapshots)
//! - Liquidation price calculation and candle-touch detection
//! - Leverage distribution of OI inflows and proportional closure of outflows
//! - Price-indexed position ledger with inclusive range consumption
//! - Per-candle processor, resumable simulator, and batch orchestrator
//!
//! No I/O lives here; loading and exporting belong to `liqmap-runner`.

pub mod domain;
pub mod engine;
pub mod fingerprint;

pub use engine::{calculate_time_evolving_heatmap, EngineConfig, EngineError, HeatmapSimulator};
