//! Liquidation price formula and the candle-touch test.
//!
//! Liquidation price under a linear maintenance-margin model:
//! - long:  `entry * (1 - 1/L + mmr/L)`
//! - short: `entry * (1 + 1/L - mmr/L)`
//!
//! A candle liquidates a position when its range reaches the level:
//! longs when `low <= liq_price`, shorts when `high >= liq_price`. Both
//! boundaries are inclusive, so an exact touch counts.

use rust_decimal::Decimal;

use crate::domain::{Candle, DomainError, Leverage, Position, Side};

use super::config::EngineConfig;

/// Liquidation price for a validated leverage tier.
pub fn liquidation_price(entry_price: Decimal, leverage: Leverage, side: Side, mmr: Decimal) -> Decimal {
    let lev = Decimal::from(leverage.value());
    let initial_margin = Decimal::ONE / lev;
    let maintenance = mmr / lev;
    let multiplier = match side {
        Side::Long => Decimal::ONE - initial_margin + maintenance,
        Side::Short => Decimal::ONE + initial_margin - maintenance,
    };
    entry_price * multiplier
}

/// Liquidation price calculator bound to a tier set and maintenance margin rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationPriceCalculator {
    mmr: Decimal,
    tiers: Vec<u32>,
}

impl LiquidationPriceCalculator {
    pub fn new(mmr: Decimal, tiers: Vec<u32>) -> Self {
        Self { mmr, tiers }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.maintenance_margin_rate, config.weights.tiers())
    }

    pub fn mmr(&self) -> Decimal {
        self.mmr
    }

    pub fn tiers(&self) -> &[u32] {
        &self.tiers
    }

    /// Validate `leverage` against the tier set and compute the level.
    pub fn calculate(
        &self,
        entry_price: Decimal,
        leverage: u32,
        side: Side,
    ) -> Result<Decimal, DomainError> {
        let leverage = Leverage::new(leverage, &self.tiers)?;
        Ok(liquidation_price(entry_price, leverage, side, self.mmr))
    }
}

/// Whether a candle's range reaches `liq_price` for a position on `side`.
#[inline]
pub fn touches(side: Side, liq_price: Decimal, candle: &Candle) -> bool {
    match side {
        Side::Long => candle.low <= liq_price,
        Side::Short => candle.high >= liq_price,
    }
}

/// Whether `candle` liquidates `position`.
pub fn should_liquidate(position: &Position, candle: &Candle) -> bool {
    touches(position.side(), position.liq_price(), candle)
}
