use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{Leverage, Side};

/// Errors raised when constructing domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("leverage {leverage} is not in the configured tier set {tiers:?}")]
    InvalidLeverage { leverage: u32, tiers: Vec<u32> },

    #[error("invalid side '{0}' (expected long or short)")]
    InvalidSide(String),

    #[error("position volume must be positive, got {0}")]
    InvalidVolume(Decimal),
}

/// Stable identity of a simulated position, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// Monotonic position ID generator. One per ledger.
#[derive(Debug, Clone, Default)]
pub struct PositionIdGen {
    next: u64,
}

impl PositionIdGen {
    pub fn next_id(&mut self) -> PositionId {
        let id = PositionId(self.next);
        self.next += 1;
        id
    }

    /// Number of IDs handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// An inferred leveraged position.
///
/// While active it is owned by the `PositionLedger`; only the ledger can
/// shrink its volume or consume it. Once `consumed_at` is set the position is
/// terminal and is handed out by value for reporting.
///
/// Serialize-only: positions are built through [`Position::new`], never
/// read back from external data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    id: PositionId,
    entry_price: Decimal,
    liq_price: Decimal,
    volume: Decimal,
    side: Side,
    leverage: Leverage,
    created_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(
        id: PositionId,
        entry_price: Decimal,
        liq_price: Decimal,
        volume: Decimal,
        side: Side,
        leverage: Leverage,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if volume <= Decimal::ZERO {
            return Err(DomainError::InvalidVolume(volume));
        }
        Ok(Self {
            id,
            entry_price,
            liq_price,
            volume,
            side,
            leverage,
            created_at,
            consumed_at: None,
        })
    }

    pub fn id(&self) -> PositionId {
        self.id
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn liq_price(&self) -> Decimal {
        self.liq_price
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn leverage(&self) -> Leverage {
        self.leverage
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn consumed_at(&self) -> Option<DateTime<Utc>> {
        self.consumed_at
    }

    pub fn is_active(&self) -> bool {
        self.consumed_at.is_none()
    }

    /// Multiply the volume by `factor` (proportional closure).
    pub(crate) fn scale_volume(&mut self, factor: Decimal) {
        debug_assert!(self.is_active(), "consumed position {} mutated", self.id);
        self.volume *= factor;
    }

    /// Terminal transition: record the liquidation timestamp.
    pub(crate) fn consume(&mut self, at: DateTime<Utc>) {
        debug_assert!(self.is_active(), "position {} consumed twice", self.id);
        if self.consumed_at.is_none() {
            self.consumed_at = Some(at);
        }
    }
}
