//! Candle and open-interest loading for the runner.
//!
//! Two input layouts are supported:
//! 1. A candle CSV (`open_time,open,high,low,close`) plus an OI CSV
//!    (`timestamp,open_interest`). OI samples are matched to candles by
//!    nearest timestamp within a tolerance and differenced into deltas.
//! 2. A single candle CSV with a precomputed `oi_delta` column.
//!
//! Timestamps are RFC 3339 strings or epoch milliseconds. Prices and OI are
//! parsed as exact decimals.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use liqmap_core::domain::Candle;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: u64, value: String },

    #[error("line {line}: invalid {column} '{value}'")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// One open-interest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OiSample {
    pub timestamp: DateTime<Utc>,
    pub open_interest: Decimal,
}

/// Engine-ready input for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedInput {
    pub candles: Vec<Candle>,
    pub oi_deltas: Vec<Decimal>,
    /// Candles that found no OI sample within tolerance (delta forced to 0).
    pub unmatched_oi: usize,
}

/// Where a symbol's input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    CandlesAndOi {
        candles: PathBuf,
        open_interest: PathBuf,
    },
    CandlesWithDeltas(PathBuf),
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    open_time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    oi_delta: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OiRow {
    timestamp: String,
    open_interest: String,
}

/// Load one symbol's input according to `source`.
pub fn load_input(source: &InputSource, tolerance: Duration) -> Result<LoadedInput, LoadError> {
    match source {
        InputSource::CandlesAndOi {
            candles,
            open_interest,
        } => {
            let candles = read_candles(open_file(candles)?)?;
            let samples = read_open_interest(open_file(open_interest)?)?;
            let (oi_deltas, unmatched_oi) = align_oi_deltas(&candles, &samples, tolerance);
            Ok(LoadedInput {
                candles,
                oi_deltas,
                unmatched_oi,
            })
        }
        InputSource::CandlesWithDeltas(path) => {
            let (candles, oi_deltas) = read_candles_with_deltas(open_file(path)?)?;
            Ok(LoadedInput {
                candles,
                oi_deltas,
                unmatched_oi: 0,
            })
        }
    }
}

fn open_file(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read `open_time,open,high,low,close` rows, returned stably sorted by
/// `open_time`. Extra columns are ignored.
///
/// Candle sanity is not checked here; the engine rejects malformed candles
/// with their index.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>, LoadError> {
    let mut candles = read_candle_rows(reader)?
        .into_iter()
        .map(|(line, row)| parse_candle(line, &row))
        .collect::<Result<Vec<_>, _>>()?;
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

/// Read candles with an `oi_delta` column; a blank delta counts as zero.
/// Each delta stays paired with its candle through the time sort.
pub fn read_candles_with_deltas<R: Read>(
    reader: R,
) -> Result<(Vec<Candle>, Vec<Decimal>), LoadError> {
    let rows = read_candle_rows(reader)?;
    let mut pairs = Vec::with_capacity(rows.len());
    for (line, row) in rows {
        let candle = parse_candle(line, &row)?;
        let delta = match row.oi_delta.as_deref().map(str::trim) {
            None | Some("") => Decimal::ZERO,
            Some(value) => parse_decimal(line, "oi_delta", value)?,
        };
        pairs.push((candle, delta));
    }
    pairs.sort_by_key(|(c, _)| c.open_time);
    Ok(pairs.into_iter().unzip())
}

/// Read `timestamp,open_interest` rows, returned sorted by timestamp.
pub fn read_open_interest<R: Read>(reader: R) -> Result<Vec<OiSample>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples = Vec::new();
    for result in rdr.deserialize::<OiRow>() {
        let row = result?;
        let line = samples.len() as u64 + 2;
        samples.push(OiSample {
            timestamp: parse_timestamp(line, &row.timestamp)?,
            open_interest: parse_decimal(line, "open_interest", &row.open_interest)?,
        });
    }
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

fn read_candle_rows<R: Read>(reader: R) -> Result<Vec<(u64, CandleRow)>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<CandleRow>().enumerate() {
        // Header is line 1.
        rows.push((i as u64 + 2, result?));
    }
    Ok(rows)
}

fn parse_candle(line: u64, row: &CandleRow) -> Result<Candle, LoadError> {
    Ok(Candle::new(
        parse_timestamp(line, &row.open_time)?,
        parse_decimal(line, "open", &row.open)?,
        parse_decimal(line, "high", &row.high)?,
        parse_decimal(line, "low", &row.low)?,
        parse_decimal(line, "close", &row.close)?,
    ))
}

fn parse_decimal(line: u64, column: &'static str, value: &str) -> Result<Decimal, LoadError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| LoadError::InvalidNumber {
            line,
            column,
            value: value.to_string(),
        })
}

/// RFC 3339 (`2024-11-01T00:00:00Z`) or integer epoch milliseconds.
pub fn parse_timestamp(line: u64, value: &str) -> Result<DateTime<Utc>, LoadError> {
    let invalid = || LoadError::InvalidTimestamp {
        line,
        value: value.to_string(),
    };
    if let Ok(millis) = value.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| invalid())
}

/// Match each candle to the nearest OI sample within `tolerance` and
/// difference consecutive matches.
///
/// `candles` must be in time order (as returned by [`read_candles`]);
/// "previous" means the previous candle in that order.
///
/// The delta for a matched candle is its OI minus the OI of the previous
/// matched candle. The first match and every unmatched candle get delta 0.
/// Returns the deltas (one per candle) and the unmatched count.
pub fn align_oi_deltas(
    candles: &[Candle],
    samples: &[OiSample],
    tolerance: Duration,
) -> (Vec<Decimal>, usize) {
    let mut deltas = Vec::with_capacity(candles.len());
    let mut previous: Option<Decimal> = None;
    let mut unmatched = 0usize;
    let mut first_gap: Option<DateTime<Utc>> = None;

    for candle in candles {
        match nearest_sample(samples, candle.open_time, tolerance) {
            Some(oi) => {
                deltas.push(previous.map_or(Decimal::ZERO, |prev| oi - prev));
                previous = Some(oi);
            }
            None => {
                debug!(open_time = %candle.open_time, "no OI sample within tolerance");
                unmatched += 1;
                first_gap.get_or_insert(candle.open_time);
                deltas.push(Decimal::ZERO);
            }
        }
    }

    if let Some(first) = first_gap {
        warn!(
            unmatched,
            candles = candles.len(),
            first_gap = %first,
            tolerance_secs = tolerance.num_seconds(),
            "candles without an OI sample; their delta is 0"
        );
    }
    (deltas, unmatched)
}

/// OI value of the sample closest to `at`, if within `tolerance`.
/// `samples` must be sorted by timestamp; ties go to the earlier sample.
fn nearest_sample(samples: &[OiSample], at: DateTime<Utc>, tolerance: Duration) -> Option<Decimal> {
    let idx = samples.partition_point(|s| s.timestamp < at);
    let before = idx.checked_sub(1).map(|i| &samples[i]);
    let after = samples.get(idx);

    let best = match (before, after) {
        (Some(b), Some(a)) => {
            if at - b.timestamp <= a.timestamp - at {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    let gap = if best.timestamp >= at {
        best.timestamp - at
    } else {
        at - best.timestamp
    };
    (gap <= tolerance).then_some(best.open_interest)
}
