//! Candle: the fundamental market data unit driving each simulation step.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLC candle for a single symbol over one interval.
///
/// Volume is not carried: position creation is driven by open-interest
/// deltas, never by traded volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Body direction of a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleShape {
    /// `close > open`
    Bullish,
    /// `close < open`
    Bearish,
    /// `close == open`
    Doji,
}

impl Candle {
    pub fn new(
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
        }
    }

    pub fn shape(&self) -> CandleShape {
        match self.close.cmp(&self.open) {
            std::cmp::Ordering::Greater => CandleShape::Bullish,
            std::cmp::Ordering::Less => CandleShape::Bearish,
            std::cmp::Ordering::Equal => CandleShape::Doji,
        }
    }

    /// Basic OHLC sanity check: high >= low, open and close inside the range,
    /// all prices strictly positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > Decimal::ZERO
    }
}
