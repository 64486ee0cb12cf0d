//! Per-candle processing: consumption, then creation, then closure.

use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{Candle, DomainError, Position};

use super::closer::{remove_proportionally, ClosureReport};
use super::config::{EngineConfig, SameCandlePolicy};
use super::distributor::LeverageDistributor;
use super::ledger::PositionLedger;

/// Positions touched by one candle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandleOutcome {
    /// Positions liquidated by this candle, with `consumed_at` set.
    pub consumed: Vec<Position>,
    /// Positions opened from this candle's positive OI delta, as created.
    /// Under `SameCandlePolicy::Recheck` some may also appear in `consumed`.
    pub created: Vec<Position>,
    /// Present when the OI delta was negative.
    pub closure: Option<ClosureReport>,
}

/// Apply one candle and its OI delta to the ledger.
///
/// 1. Consumption: every active position whose level the candle touches is
///    consumed at `candle.open_time` and removed.
/// 2. Creation: a positive delta opens one position per weighted tier at
///    `candle.close`, on the side chosen by the configured inference.
/// 3. Closure: a negative delta shrinks all remaining positions proportionally.
///
/// With `SameCandlePolicy::Legacy`, positions from step 2 are first checked
/// against the next candle.
pub fn process_candle(
    candle: &Candle,
    oi_delta: Decimal,
    ledger: &mut PositionLedger,
    config: &EngineConfig,
) -> Result<CandleOutcome, DomainError> {
    let distributor = LeverageDistributor::from_config(config);
    process_with(candle, oi_delta, ledger, config, &distributor)
}

pub(crate) fn process_with(
    candle: &Candle,
    oi_delta: Decimal,
    ledger: &mut PositionLedger,
    config: &EngineConfig,
    distributor: &LeverageDistributor,
) -> Result<CandleOutcome, DomainError> {
    // ─── Consumption ───
    let mut consumed = ledger.take_touched(candle);

    // ─── Creation ───
    let mut created = Vec::new();
    if oi_delta > Decimal::ZERO {
        if let Some(side) = config.side_inference.infer(candle) {
            created = distributor.create_positions(
                candle.close,
                oi_delta,
                side,
                candle.open_time,
                ledger.id_gen_mut(),
            )?;
            ledger.extend(created.iter().cloned());

            if config.same_candle_policy == SameCandlePolicy::Recheck {
                consumed.extend(ledger.take_touched(candle));
            }
        }
    }

    // ─── Closure ───
    let closure = if oi_delta < Decimal::ZERO {
        Some(remove_proportionally(ledger, oi_delta.abs()))
    } else {
        None
    };

    debug!(
        open_time = %candle.open_time,
        %oi_delta,
        consumed = consumed.len(),
        created = created.len(),
        closure_ratio = ?closure.map(|c| c.ratio),
        active = ledger.len(),
        "processed candle"
    );

    Ok(CandleOutcome {
        consumed,
        created,
        closure,
    })
}
