//! Batch orchestration: candles plus OI deltas in, one snapshot per candle out.

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::{Candle, Snapshot};

use super::config::EngineConfig;
use super::simulator::{EngineError, HeatmapSimulator, SimulationTotals};

/// Result of a complete batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// One snapshot per input candle, in `open_time` order.
    pub snapshots: Vec<Snapshot>,
    pub totals: SimulationTotals,
    /// Positions still active after the last candle.
    pub final_active_positions: usize,
    pub final_active_volume: Decimal,
}

/// Run the time-evolving liquidation simulation over a candle sequence.
///
/// - Fails with `LengthMismatch` when the two sequences differ in length.
/// - Empty input yields an empty result.
/// - Pairs are re-sorted by `open_time` (stable) before processing.
/// - One ledger spans the whole run.
///
/// Any error aborts the run; partial snapshot sequences are never returned.
/// A `MalformedCandle` index refers to the caller's input order.
pub fn calculate_time_evolving_heatmap(
    candles: &[Candle],
    oi_deltas: &[Decimal],
    symbol: &str,
    config: &EngineConfig,
) -> Result<Vec<Snapshot>, EngineError> {
    run_heatmap(candles, oi_deltas, symbol, config).map(|out| out.snapshots)
}

/// Same as [`calculate_time_evolving_heatmap`], with run totals and the
/// final ledger state.
pub fn run_heatmap(
    candles: &[Candle],
    oi_deltas: &[Decimal],
    symbol: &str,
    config: &EngineConfig,
) -> Result<RunOutput, EngineError> {
    if candles.len() != oi_deltas.len() {
        return Err(EngineError::LengthMismatch {
            candles: candles.len(),
            oi_deltas: oi_deltas.len(),
        });
    }

    let mut simulator = HeatmapSimulator::new(symbol, config.clone())?;
    if candles.is_empty() {
        return Ok(RunOutput {
            snapshots: Vec::new(),
            totals: SimulationTotals::default(),
            final_active_positions: 0,
            final_active_volume: Decimal::ZERO,
        });
    }

    let mut pairs: Vec<(usize, &Candle, Decimal)> = candles
        .iter()
        .zip(oi_deltas.iter().copied())
        .enumerate()
        .map(|(i, (candle, delta))| (i, candle, delta))
        .collect();
    pairs.sort_by_key(|(_, candle, _)| candle.open_time);

    info!(
        symbol,
        candles = pairs.len(),
        bucket_size = %config.bucket_size,
        mmr = %config.maintenance_margin_rate,
        "starting heatmap run"
    );

    let mut snapshots = Vec::with_capacity(pairs.len());
    for (input_index, candle, oi_delta) in pairs {
        let snapshot = simulator.step(candle, oi_delta).map_err(|e| match e {
            EngineError::MalformedCandle { open_time, .. } => EngineError::MalformedCandle {
                index: input_index,
                open_time,
            },
            other => other,
        })?;
        snapshots.push(snapshot);
    }

    let totals = simulator.totals();
    let ledger = simulator.ledger();
    info!(
        symbol,
        snapshots = snapshots.len(),
        created = totals.positions_created,
        consumed = totals.positions_consumed,
        dropped = totals.positions_dropped,
        active = ledger.len(),
        "heatmap run complete"
    );

    Ok(RunOutput {
        final_active_positions: ledger.len(),
        final_active_volume: ledger.total_volume(),
        snapshots,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn flat(hour: i64, price: Decimal) -> Candle {
        Candle::new(ts(hour), price, price + dec!(50), price - dec!(50), price + dec!(10))
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = calculate_time_evolving_heatmap(
            &[flat(0, dec!(100000))],
            &[],
            "BTCUSDT",
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::LengthMismatch {
                candles: 1,
                oi_deltas: 0
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = calculate_time_evolving_heatmap(&[], &[], "BTCUSDT", &EngineConfig::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unsorted_input_is_processed_chronologically() {
        let candles = vec![flat(2, dec!(100000)), flat(0, dec!(100000)), flat(1, dec!(100000))];
        let deltas = vec![dec!(30), dec!(10), dec!(20)];
        let snaps =
            calculate_time_evolving_heatmap(&candles, &deltas, "BTCUSDT", &EngineConfig::default())
                .unwrap();
        let times: Vec<_> = snaps.iter().map(|s| s.timestamp()).collect();
        assert_eq!(times, vec![ts(0), ts(1), ts(2)]);
        // Deltas travel with their candles: 10, then +20, then +30.
        let totals: Vec<Decimal> = snaps.iter().map(|s| s.total_volume()).collect();
        assert_eq!(totals, vec![dec!(10), dec!(30), dec!(60)]);
    }

    #[test]
    fn malformed_candle_index_refers_to_input_order() {
        let bad = Candle::new(ts(0), dec!(100000), dec!(99000), dec!(101000), dec!(100000));
        let candles = vec![flat(1, dec!(100000)), flat(2, dec!(100000)), bad];
        let deltas = vec![dec!(10), dec!(10), dec!(10)];
        let err = run_heatmap(&candles, &deltas, "BTCUSDT", &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            EngineError::MalformedCandle {
                index: 2,
                open_time: ts(0)
            }
        );
    }

    #[test]
    fn run_output_reports_final_state() {
        let candles = vec![flat(0, dec!(100000)), flat(1, dec!(100000))];
        let deltas = vec![dec!(1000), dec!(-500)];
        let out = run_heatmap(&candles, &deltas, "BTCUSDT", &EngineConfig::default()).unwrap();
        assert_eq!(out.snapshots.len(), 2);
        assert_eq!(out.final_active_positions, 5);
        assert_eq!(out.final_active_volume, dec!(500));
        assert_eq!(out.totals.positions_created, 5);
    }

    #[test]
    fn config_errors_surface_even_for_empty_input() {
        let config = EngineConfig::with_bucket_size(dec!(0));
        assert!(matches!(
            calculate_time_evolving_heatmap(&[], &[], "BTCUSDT", &config),
            Err(EngineError::Config(_))
        ));
    }
}
