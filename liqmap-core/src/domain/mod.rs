//! Domain types for the liquidation heatmap engine

pub mod candle;
pub mod leverage;
pub mod position;
pub mod side;
pub mod snapshot;

pub use candle::{Candle, CandleShape};
pub use leverage::{Leverage, DEFAULT_LEVERAGE_TIERS};
pub use position::{DomainError, Position, PositionId, PositionIdGen};
pub use side::Side;
pub use snapshot::{Cell, Snapshot};
