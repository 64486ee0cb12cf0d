//! Leverage tiers.

use serde::Serialize;
use std::fmt;

use super::DomainError;

/// Default tier set, in ascending order.
pub const DEFAULT_LEVERAGE_TIERS: [u32; 5] = [5, 10, 25, 50, 100];

/// A leverage multiplier that is known to belong to a configured tier set.
///
/// The only way to obtain one is [`Leverage::new`], so a `Position` can never
/// hold a leverage outside its tier set. Serialize-only for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Leverage(u32);

impl Leverage {
    pub fn new(value: u32, tiers: &[u32]) -> Result<Self, DomainError> {
        if value == 0 || !tiers.contains(&value) {
            return Err(DomainError::InvalidLeverage {
                leverage: value,
                tiers: tiers.to_vec(),
            });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}
