//! Proportional closer: applies a negative OI delta to the whole ledger.
//!
//! A falling open interest reveals how much volume closed, not which
//! positions closed. Every active position is shrunk by the same fraction,
//! across all buckets and both sides, so relative volumes are preserved.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ledger::PositionLedger;

/// What a proportional closure did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClosureReport {
    /// Fraction of every position removed, in `[0, 1]`.
    pub ratio: Decimal,
    /// Active volume before minus active volume after (includes dropped dust).
    pub volume_removed: Decimal,
    /// Positions dropped for falling below the dust threshold.
    pub positions_dropped: usize,
}

/// Shrink every active position by `min(volume_to_remove / total, 1)`.
///
/// No-op when the ledger holds no volume or `volume_to_remove` is not positive.
pub fn remove_proportionally(ledger: &mut PositionLedger, volume_to_remove: Decimal) -> ClosureReport {
    let total = ledger.total_volume();
    if total.is_zero() || volume_to_remove <= Decimal::ZERO {
        return ClosureReport::default();
    }

    let ratio = (volume_to_remove / total).min(Decimal::ONE);
    let positions_dropped = ledger.scale_all(Decimal::ONE - ratio);
    let volume_removed = total - ledger.total_volume();

    ClosureReport {
        ratio,
        volume_removed,
        positions_dropped,
    }
}
