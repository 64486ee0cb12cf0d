//! Side inference: which side of the market a positive OI delta is assigned to.
//!
//! The candle-direction rule (bullish → long, bearish → short) has no answer
//! for a doji, so the doji outcome is an explicit parameter rather than a
//! hidden default.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, CandleShape, Side};

/// What to do when `close == open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DojiPolicy {
    #[default]
    Long,
    Short,
    /// Create no positions on a doji candle.
    Skip,
}

/// Strategy mapping a candle to the side of newly opened positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SideInference {
    /// Bullish → long, bearish → short, doji per `doji`.
    CandleDirection { doji: DojiPolicy },
    /// Always assign the same side.
    Fixed { side: Side },
}

impl Default for SideInference {
    fn default() -> Self {
        SideInference::CandleDirection {
            doji: DojiPolicy::Long,
        }
    }
}

impl SideInference {
    /// Returns `None` when the policy declines to open positions for this candle.
    pub fn infer(&self, candle: &Candle) -> Option<Side> {
        match *self {
            SideInference::Fixed { side } => Some(side),
            SideInference::CandleDirection { doji } => match candle.shape() {
                CandleShape::Bullish => Some(Side::Long),
                CandleShape::Bearish => Some(Side::Short),
                CandleShape::Doji => match doji {
                    DojiPolicy::Long => Some(Side::Long),
                    DojiPolicy::Short => Some(Side::Short),
                    DojiPolicy::Skip => None,
                },
            },
        }
    }
}

/// Default inference: bullish → long, bearish → short, doji → long.
pub fn infer_side(candle: &Candle) -> Side {
    match candle.shape() {
        CandleShape::Bearish => Side::Short,
        CandleShape::Bullish | CandleShape::Doji => Side::Long,
    }
}
