//! Integration tests for the heatmap engine.
//!
//! Tests:
//! 1. Reference scenarios: liquidation levels, tier split, 50% closure, empty input
//! 2. Multi-candle lifecycle: creation, liquidation sweep, closure, re-creation
//! 3. Streaming vs batch: a simulator fed candle by candle matches the batch run
//! 4. Error surfaces: malformed candles and unusable bucket grids abort the run

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use liqmap_core::domain::{Candle, Leverage, PositionIdGen, Side, DEFAULT_LEVERAGE_TIERS};
use liqmap_core::engine::{
    calculate_time_evolving_heatmap, remove_proportionally, run_heatmap, EngineConfig,
    EngineError, HeatmapSimulator, LeverageDistributor, LiquidationPriceCalculator,
    PositionLedger, DEFAULT_MAINTENANCE_MARGIN_RATE,
};

/// Helper: timestamp `hour` hours after a fixed base.
fn ts(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
}

/// Helper: OHLC candle at hour offset.
fn candle(hour: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
    Candle::new(ts(hour), open, high, low, close)
}

fn calculator() -> LiquidationPriceCalculator {
    LiquidationPriceCalculator::new(DEFAULT_MAINTENANCE_MARGIN_RATE, DEFAULT_LEVERAGE_TIERS.to_vec())
}

// ── 1. Reference scenarios ───────────────────────────────────────────

#[test]
fn scenario_a_ten_x_long() {
    let liq = calculator().calculate(dec!(100000), 10, Side::Long).unwrap();
    assert_eq!(liq, dec!(90040.00));
}

#[test]
fn scenario_b_five_x_short() {
    let liq = calculator().calculate(dec!(100000), 5, Side::Short).unwrap();
    assert_eq!(liq, dec!(119920.00));
}

#[test]
fn unknown_tier_is_rejected() {
    assert!(calculator().calculate(dec!(100000), 20, Side::Long).is_err());
    assert!(calculator().calculate(dec!(100000), 0, Side::Long).is_err());
}

#[test]
fn scenario_c_default_tier_split() {
    let distributor = LeverageDistributor::from_config(&EngineConfig::default());
    let mut ids = PositionIdGen::default();
    let created = distributor
        .create_positions(dec!(100000), dec!(1000000), Side::Long, ts(0), &mut ids)
        .unwrap();
    let split: Vec<(u32, Decimal)> = created
        .iter()
        .map(|p| (p.leverage().value(), p.volume()))
        .collect();
    assert_eq!(
        split,
        vec![
            (5, dec!(150000)),
            (10, dec!(300000)),
            (25, dec!(250000)),
            (50, dec!(200000)),
            (100, dec!(100000)),
        ]
    );
}

#[test]
fn scenario_d_half_closure_keeps_buckets() {
    let config = EngineConfig::default();
    let distributor = LeverageDistributor::from_config(&config);
    let mut ledger = PositionLedger::new();
    let created = distributor
        .create_positions(dec!(100000), dec!(1000000), Side::Long, ts(0), ledger.id_gen_mut())
        .unwrap();
    let before: Vec<Decimal> = created.iter().map(|p| p.volume()).collect();
    ledger.extend(created);
    let keys_before = ledger.price_keys(Side::Long);

    let report = remove_proportionally(&mut ledger, dec!(500000));
    assert_eq!(report.ratio, dec!(0.5));

    // Ledger iterates by ascending liquidation price, i.e. 5x first for longs.
    let after: Vec<Decimal> = ledger.iter().map(|p| p.volume()).collect();
    let halved: Vec<Decimal> = before.iter().map(|v| *v / dec!(2)).collect();
    assert_eq!(after, halved);
    assert_eq!(ledger.price_keys(Side::Long), keys_before);
}

#[test]
fn scenario_e_empty_input() {
    let snaps =
        calculate_time_evolving_heatmap(&[], &[], "BTCUSDT", &EngineConfig::default()).unwrap();
    assert!(snaps.is_empty());
}

// ── 2. Multi-candle lifecycle ────────────────────────────────────────

#[test]
fn lifecycle_across_candles() {
    let candles = vec![
        // Bullish: longs opened at 100000.
        candle(0, dec!(99500), dec!(100200), dec!(99400), dec!(100000)),
        // Flush to 97000: takes out the 100x (99004) and 50x (98008) longs.
        candle(1, dec!(100000), dec!(100100), dec!(97000), dec!(97500)),
        // OI falls by half of what is left.
        candle(2, dec!(97500), dec!(98000), dec!(97200), dec!(97800)),
        // Bearish: shorts opened at 97000.
        candle(3, dec!(97800), dec!(97900), dec!(96900), dec!(97000)),
    ];
    let deltas = vec![dec!(1000000), dec!(0), dec!(-350000), dec!(200000)];
    let out = run_heatmap(&candles, &deltas, "BTCUSDT", &EngineConfig::default()).unwrap();
    let snaps = &out.snapshots;
    assert_eq!(snaps.len(), 4);

    assert_eq!(snaps[0].positions_created(), 5);
    assert_eq!(snaps[0].total_long_volume(), dec!(1000000));

    assert_eq!(snaps[1].positions_consumed(), 2);
    assert_eq!(snaps[1].total_long_volume(), dec!(700000));

    assert_eq!(snaps[2].total_long_volume(), dec!(350000));
    assert_eq!(snaps[2].positions_consumed(), 0);

    assert_eq!(snaps[3].positions_created(), 5);
    assert_eq!(snaps[3].total_short_volume(), dec!(200000));
    assert_eq!(snaps[3].total_long_volume(), dec!(350000));

    assert_eq!(out.totals.positions_created, 10);
    assert_eq!(out.totals.positions_consumed, 2);
    assert_eq!(out.final_active_positions, 8);
}

#[test]
fn snapshot_levels_follow_bucket_size() {
    let candles = vec![candle(0, dec!(99500), dec!(100200), dec!(99400), dec!(100000))];
    let config = EngineConfig::with_bucket_size(dec!(1000));
    let snaps = calculate_time_evolving_heatmap(&candles, &[dec!(1000)], "BTCUSDT", &config)
        .unwrap();
    let prices: Vec<Decimal> = snaps[0].levels().iter().map(|c| c.price).collect();
    // 5x 80080, 10x 90040, 25x 96016, 50x 98008, 100x 99004
    assert_eq!(
        prices,
        vec![dec!(80000), dec!(90000), dec!(96000), dec!(98000), dec!(99000)]
    );
    assert!(snaps[0].levels().iter().all(|c| c.short_density.is_zero()));
}

#[test]
fn each_run_starts_with_a_fresh_ledger() {
    let candles = vec![candle(0, dec!(99500), dec!(100200), dec!(99400), dec!(100000))];
    let config = EngineConfig::default();
    let first = calculate_time_evolving_heatmap(&candles, &[dec!(10)], "BTCUSDT", &config).unwrap();
    let second =
        calculate_time_evolving_heatmap(&candles, &[dec!(10)], "BTCUSDT", &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(second[0].total_volume(), dec!(10));
}

#[test]
fn equal_open_times_keep_input_order() {
    let candles = vec![
        candle(1, dec!(99950), dec!(100000), dec!(99900), dec!(99950)),
        candle(0, dec!(99900), dec!(100050), dec!(99850), dec!(100000)),
        candle(0, dec!(100000), dec!(100020), dec!(99900), dec!(99950)),
    ];
    let deltas = vec![dec!(0), dec!(1000), dec!(-500)];
    let snaps =
        calculate_time_evolving_heatmap(&candles, &deltas, "BTCUSDT", &EngineConfig::default())
            .unwrap();

    let times: Vec<_> = snaps.iter().map(|s| s.timestamp()).collect();
    assert_eq!(times, vec![ts(0), ts(0), ts(1)]);
    // +1000 opens longs first, then -500 halves them.
    assert_eq!(snaps[0].positions_created(), 5);
    assert_eq!(snaps[1].positions_created(), 0);
    let totals: Vec<Decimal> = snaps.iter().map(|s| s.total_long_volume()).collect();
    assert_eq!(totals, vec![dec!(1000), dec!(500), dec!(500)]);
}

// ── 3. Streaming vs batch ────────────────────────────────────────────

#[test]
fn streaming_matches_batch() {
    let candles: Vec<Candle> = (0..48)
        .map(|i| {
            let base = dec!(100000) + Decimal::from((i % 7) * 400) - dec!(1200);
            let close = if i % 2 == 0 { base + dec!(150) } else { base - dec!(150) };
            candle(i, base, base + dec!(900), base - dec!(900), close)
        })
        .collect();
    let deltas: Vec<Decimal> = (0..48)
        .map(|i| Decimal::from(if i % 5 == 4 { -20000 } else { 50000 }))
        .collect();

    let config = EngineConfig::default();
    let batch = calculate_time_evolving_heatmap(&candles, &deltas, "BTCUSDT", &config).unwrap();

    let mut sim = HeatmapSimulator::new("BTCUSDT", config).unwrap();
    let streamed: Vec<_> = candles
        .iter()
        .zip(deltas.iter().copied())
        .map(|(c, d)| sim.step(c, d).unwrap())
        .collect();

    assert_eq!(batch, streamed);
}

// ── 4. Error surfaces ────────────────────────────────────────────────

#[test]
fn malformed_candle_aborts_run() {
    let candles = vec![
        candle(0, dec!(99500), dec!(100200), dec!(99400), dec!(100000)),
        candle(1, dec!(100000), dec!(99000), dec!(101000), dec!(100000)),
    ];
    let err = calculate_time_evolving_heatmap(
        &candles,
        &[dec!(1), dec!(1)],
        "BTCUSDT",
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        EngineError::MalformedCandle {
            index: 1,
            open_time: ts(1)
        }
    );
}

#[test]
fn unrepresentable_bucket_grid_is_an_error() {
    let tiny = dec!(0.0000000000000000000000001);
    let config = EngineConfig::with_bucket_size(tiny);
    assert!(config.validate().is_ok());

    let candles = vec![candle(0, dec!(99500), dec!(100200), dec!(99400), dec!(100000))];
    let err = calculate_time_evolving_heatmap(&candles, &[dec!(1000)], "BTCUSDT", &config)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::BucketOverflow { bucket_size, .. } if bucket_size == tiny
    ));
}

#[test]
fn leverage_value_object_is_tier_checked() {
    assert!(Leverage::new(25, &DEFAULT_LEVERAGE_TIERS).is_ok());
    assert!(Leverage::new(3, &DEFAULT_LEVERAGE_TIERS).is_err());
}
