//! Heatmap snapshot: the bucketed state of the ledger at one time step.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price bucket of the heatmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Lower edge of the bucket (`floor(liq_price / bucket_size) * bucket_size`).
    pub price: Decimal,
    pub long_density: Decimal,
    pub short_density: Decimal,
}

impl Cell {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            long_density: Decimal::ZERO,
            short_density: Decimal::ZERO,
        }
    }

    pub fn total_density(&self) -> Decimal {
        self.long_density + self.short_density
    }

    pub fn is_empty(&self) -> bool {
        self.long_density.is_zero() && self.short_density.is_zero()
    }
}

/// Complete heatmap state after processing one candle.
///
/// Levels are sorted by ascending price and each bucket appears once.
/// Snapshots are plain values: they never alias positions held in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    timestamp: DateTime<Utc>,
    symbol: String,
    levels: Vec<Cell>,
    total_long_volume: Decimal,
    total_short_volume: Decimal,
    positions_created: usize,
    positions_consumed: usize,
}

impl Snapshot {
    /// Build a snapshot from already-bucketed levels.
    ///
    /// `levels` must be sorted by ascending price with unique prices; the
    /// aggregator produces them from a `BTreeMap`, which guarantees both.
    pub(crate) fn from_sorted_levels(
        timestamp: DateTime<Utc>,
        symbol: &str,
        levels: Vec<Cell>,
        total_long_volume: Decimal,
        total_short_volume: Decimal,
        positions_created: usize,
        positions_consumed: usize,
    ) -> Self {
        debug_assert!(levels.windows(2).all(|w| w[0].price < w[1].price));
        Self {
            timestamp,
            symbol: symbol.to_string(),
            levels,
            total_long_volume,
            total_short_volume,
            positions_created,
            positions_consumed,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn levels(&self) -> &[Cell] {
        &self.levels
    }

    pub fn total_long_volume(&self) -> Decimal {
        self.total_long_volume
    }

    pub fn total_short_volume(&self) -> Decimal {
        self.total_short_volume
    }

    pub fn total_volume(&self) -> Decimal {
        self.total_long_volume + self.total_short_volume
    }

    pub fn positions_created(&self) -> usize {
        self.positions_created
    }

    pub fn positions_consumed(&self) -> usize {
        self.positions_consumed
    }

    /// Look up the cell whose bucket starts at `price`.
    pub fn cell(&self, price: Decimal) -> Option<&Cell> {
        self.levels
            .binary_search_by(|c| c.price.cmp(&price))
            .ok()
            .map(|i| &self.levels[i])
    }

    /// Cells carrying any density, in price order.
    pub fn non_zero_levels(&self) -> impl Iterator<Item = &Cell> {
        self.levels.iter().filter(|c| !c.is_empty())
    }

    /// The `n` densest cells, highest combined density first.
    /// Ties resolve to the lower price.
    pub fn top_levels(&self, n: usize) -> Vec<&Cell> {
        let mut ranked: Vec<&Cell> = self.non_zero_levels().collect();
        ranked.sort_by(|a, b| {
            b.total_density()
                .cmp(&a.total_density())
                .then(a.price.cmp(&b.price))
        });
        ranked.truncate(n);
        ranked
    }
}
