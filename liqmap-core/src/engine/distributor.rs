//! Leverage distributor: turns one injected volume into one position per tier.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{DomainError, Leverage, Position, PositionIdGen, Side};

use super::config::{EngineConfig, LeverageWeights};
use super::liquidation::liquidation_price;

/// Splits injected open interest across the leverage weight table.
#[derive(Debug, Clone)]
pub struct LeverageDistributor {
    weights: LeverageWeights,
    mmr: Decimal,
}

impl LeverageDistributor {
    pub fn new(weights: LeverageWeights, mmr: Decimal) -> Self {
        Self { weights, mmr }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.weights.clone(), config.maintenance_margin_rate)
    }

    pub fn weights(&self) -> &LeverageWeights {
        &self.weights
    }

    /// Create one position per tier with a positive fraction.
    ///
    /// Tier volume is `volume * fraction`; zero-weight tiers are skipped. The
    /// emitted volumes sum to `volume` up to decimal rounding. Fails with
    /// `InvalidVolume` when `volume` is not positive.
    pub fn create_positions(
        &self,
        entry_price: Decimal,
        volume: Decimal,
        side: Side,
        timestamp: DateTime<Utc>,
        ids: &mut PositionIdGen,
    ) -> Result<Vec<Position>, DomainError> {
        if volume <= Decimal::ZERO {
            return Err(DomainError::InvalidVolume(volume));
        }
        let tiers = self.weights.tiers();
        let mut positions = Vec::with_capacity(tiers.len());

        for row in self.weights.rows() {
            if row.fraction <= Decimal::ZERO {
                continue;
            }
            let leverage = Leverage::new(row.leverage, &tiers)?;
            let tier_volume = volume * row.fraction;
            let liq_price = liquidation_price(entry_price, leverage, side, self.mmr);
            positions.push(Position::new(
                ids.next_id(),
                entry_price,
                liq_price,
                tier_volume,
                side,
                leverage,
                timestamp,
            )?);
        }

        Ok(positions)
    }
}
