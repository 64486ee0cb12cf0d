//! Snapshot aggregation: bucket active positions by liquidation price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::{Cell, Side, Snapshot};

use super::ledger::PositionLedger;
use super::simulator::EngineError;

/// Lower edge of the bucket containing `price`, or `None` when the grid
/// index does not fit in a `Decimal` (a tiny `bucket_size` against a large
/// price).
pub fn bucket_price(price: Decimal, bucket_size: Decimal) -> Option<Decimal> {
    let index = price.checked_div(bucket_size)?.floor();
    Some(index.checked_mul(bucket_size)?.normalize())
}

/// Build one snapshot from the ledger's active positions.
///
/// `bucket_size` must be positive; `EngineConfig::validate` enforces this
/// before any run.
pub fn aggregate(
    timestamp: DateTime<Utc>,
    symbol: &str,
    ledger: &PositionLedger,
    positions_created: usize,
    positions_consumed: usize,
    bucket_size: Decimal,
) -> Result<Snapshot, EngineError> {
    let mut cells: BTreeMap<Decimal, Cell> = BTreeMap::new();
    let mut total_long = Decimal::ZERO;
    let mut total_short = Decimal::ZERO;

    for position in ledger.iter() {
        let bucket = bucket_price(position.liq_price(), bucket_size).ok_or(
            EngineError::BucketOverflow {
                price: position.liq_price(),
                bucket_size,
            },
        )?;
        let cell = cells.entry(bucket).or_insert_with(|| Cell::new(bucket));
        match position.side() {
            Side::Long => {
                cell.long_density += position.volume();
                total_long += position.volume();
            }
            Side::Short => {
                cell.short_density += position.volume();
                total_short += position.volume();
            }
        }
    }

    Ok(Snapshot::from_sorted_levels(
        timestamp,
        symbol,
        cells.into_values().collect(),
        total_long,
        total_short,
        positions_created,
        positions_consumed,
    ))
}
