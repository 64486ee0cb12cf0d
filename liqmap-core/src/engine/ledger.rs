//! Position ledger: exclusive owner of every active position.
//!
//! Positions are indexed per side by normalized liquidation price:
//! - longs:  `BTreeMap<liq_price, Vec<Position>>`, consumed by `range(low..)`
//! - shorts: `BTreeMap<liq_price, Vec<Position>>`, consumed by `range(..=high)`
//!
//! The range queries select exactly the positions the inclusive touch rule in
//! `liquidation::touches` selects, without scanning untouched levels.
//! Within one price key, positions keep insertion order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::{Candle, Position, PositionIdGen, Side};

/// Positions whose volume falls below this after proportional closure are dropped.
pub const DUST_VOLUME: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

type PriceIndex = BTreeMap<Decimal, Vec<Position>>;

/// Mutable collection of active positions for one symbol.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    longs: PriceIndex,
    shorts: PriceIndex,
    ids: PositionIdGen,
    len: usize,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active positions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// ID generator for positions destined for this ledger.
    pub fn id_gen_mut(&mut self) -> &mut PositionIdGen {
        &mut self.ids
    }

    fn index(&self, side: Side) -> &PriceIndex {
        match side {
            Side::Long => &self.longs,
            Side::Short => &self.shorts,
        }
    }

    fn index_mut(&mut self, side: Side) -> &mut PriceIndex {
        match side {
            Side::Long => &mut self.longs,
            Side::Short => &mut self.shorts,
        }
    }

    /// Insert an active position under its liquidation price.
    pub fn insert(&mut self, position: Position) {
        debug_assert!(position.is_active(), "consumed position {} re-inserted", position.id());
        let key = position.liq_price().normalize();
        self.index_mut(position.side())
            .entry(key)
            .or_default()
            .push(position);
        self.len += 1;
    }

    pub fn extend(&mut self, positions: impl IntoIterator<Item = Position>) {
        for position in positions {
            self.insert(position);
        }
    }

    /// All active positions: longs then shorts, each by ascending liquidation price.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.longs
            .values()
            .chain(self.shorts.values())
            .flat_map(|bucket| bucket.iter())
    }

    /// Active positions on one side, by ascending liquidation price.
    pub fn iter_side(&self, side: Side) -> impl Iterator<Item = &Position> {
        self.index(side).values().flat_map(|bucket| bucket.iter())
    }

    /// Distinct liquidation price keys currently held, per side.
    pub fn price_keys(&self, side: Side) -> Vec<Decimal> {
        self.index(side).keys().copied().collect()
    }

    pub fn total_volume(&self) -> Decimal {
        self.iter().map(|p| p.volume()).sum()
    }

    pub fn side_volume(&self, side: Side) -> Decimal {
        self.iter_side(side).map(|p| p.volume()).sum()
    }

    /// Remove and consume every position whose level lies inside the candle's range.
    ///
    /// Each removed position gets `consumed_at = candle.open_time`. Returned
    /// order: longs by ascending price, then shorts by ascending price.
    pub fn take_touched(&mut self, candle: &Candle) -> Vec<Position> {
        let long_keys: Vec<Decimal> = self.longs.range(candle.low..).map(|(k, _)| *k).collect();
        let short_keys: Vec<Decimal> = self
            .shorts
            .range(..=candle.high)
            .map(|(k, _)| *k)
            .collect();

        let mut consumed = Vec::new();
        drain_keys(&mut self.longs, &long_keys, candle.open_time, &mut consumed);
        drain_keys(&mut self.shorts, &short_keys, candle.open_time, &mut consumed);
        self.len -= consumed.len();
        consumed
    }

    /// Multiply every active volume by `factor`, then drop positions below
    /// [`DUST_VOLUME`]. Returns how many positions were dropped.
    ///
    /// Dropped positions are not liquidations: they leave without a
    /// `consumed_at` timestamp.
    pub fn scale_all(&mut self, factor: Decimal) -> usize {
        let before = self.len;
        for index in [&mut self.longs, &mut self.shorts] {
            index.retain(|_, bucket| {
                for position in bucket.iter_mut() {
                    position.scale_volume(factor);
                }
                bucket.retain(|p| p.volume() >= DUST_VOLUME);
                !bucket.is_empty()
            });
        }
        self.len = self.longs.values().chain(self.shorts.values()).map(Vec::len).sum();
        before - self.len
    }
}

fn drain_keys(
    index: &mut PriceIndex,
    keys: &[Decimal],
    at: DateTime<Utc>,
    out: &mut Vec<Position>,
) {
    for key in keys {
        if let Some(bucket) = index.remove(key) {
            for mut position in bucket {
                position.consume(at);
                out.push(position);
            }
        }
    }
}
