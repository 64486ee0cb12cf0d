//! Heatmap engine: candle-by-candle lifecycle simulation.
//!
//! Each candle runs three phases against one position ledger:
//!
//! 1. Consumption: positions whose liquidation level the candle touches are removed
//! 2. Creation: a positive OI delta opens one position per leverage tier
//! 3. Closure: a negative OI delta shrinks every remaining position proportionally
//!
//! After the phases the ledger is bucketed into a `Snapshot`.

pub mod aggregator;
pub mod closer;
pub mod config;
pub mod distributor;
pub mod ledger;
pub mod liquidation;
pub mod loop_runner;
pub mod processor;
pub mod side_inference;
pub mod simulator;

pub use aggregator::{aggregate, bucket_price};
pub use closer::{remove_proportionally, ClosureReport};
pub use config::{
    ConfigError, EngineConfig, LeverageWeights, SameCandlePolicy, TierWeight,
    DEFAULT_BUCKET_SIZE, DEFAULT_MAINTENANCE_MARGIN_RATE,
};
pub use distributor::LeverageDistributor;
pub use ledger::{PositionLedger, DUST_VOLUME};
pub use liquidation::{liquidation_price, should_liquidate, touches, LiquidationPriceCalculator};
pub use loop_runner::{calculate_time_evolving_heatmap, run_heatmap, RunOutput};
pub use processor::{process_candle, CandleOutcome};
pub use side_inference::{infer_side, DojiPolicy, SideInference};
pub use simulator::{EngineError, HeatmapSimulator, SimulationTotals, StepReport};
