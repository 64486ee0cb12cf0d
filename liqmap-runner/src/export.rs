//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for heatmap runs:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: per-cell levels and per-candle totals for plotting tools
//! - **Markdown**: human-readable run summary with the densest levels
//!
//! All persisted artifacts include a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::runner::{HeatmapRun, SCHEMA_VERSION};

/// Number of levels listed in the Markdown report.
pub const REPORT_TOP_LEVELS: usize = 10;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `HeatmapRun` to pretty JSON.
pub fn export_json(run: &HeatmapRun) -> Result<String> {
    serde_json::to_string_pretty(run).context("failed to serialize HeatmapRun to JSON")
}

/// Deserialize a `HeatmapRun` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<HeatmapRun> {
    let run: HeatmapRun =
        serde_json::from_str(json).context("failed to deserialize HeatmapRun from JSON")?;
    if run.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            run.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(run)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per non-empty cell of every snapshot.
///
/// Columns: timestamp, symbol, price, long_density, short_density
pub fn export_levels_csv(run: &HeatmapRun) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "symbol", "price", "long_density", "short_density"])?;

    for snap in &run.snapshots {
        let timestamp = snap.timestamp().to_rfc3339();
        for cell in snap.non_zero_levels() {
            wtr.write_record([
                timestamp.as_str(),
                snap.symbol(),
                cell.price.to_string().as_str(),
                cell.long_density.to_string().as_str(),
                cell.short_density.to_string().as_str(),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per snapshot with its totals.
///
/// Columns: timestamp, total_long_volume, total_short_volume,
/// positions_created, positions_consumed, levels
pub fn export_summary_csv(run: &HeatmapRun) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "total_long_volume",
        "total_short_volume",
        "positions_created",
        "positions_consumed",
        "levels",
    ])?;
    for snap in &run.snapshots {
        wtr.write_record([
            &snap.timestamp().to_rfc3339(),
            &snap.total_long_volume().to_string(),
            &snap.total_short_volume().to_string(),
            &snap.positions_created().to_string(),
            &snap.positions_consumed().to_string(),
            &snap.levels().len().to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown summary of a run: metadata, lifecycle totals, densest final levels.
pub fn generate_report(run: &HeatmapRun) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str(&format!("# Liquidation Heatmap: {}\n\n", run.symbol()));

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", run.fingerprint.run_id()));
    md.push_str(&format!("| Candles | {} |\n", run.candle_count));
    if let (Some(first), Some(last)) = (run.snapshots.first(), run.snapshots.last()) {
        md.push_str(&format!(
            "| Period | {} to {} |\n",
            first.timestamp().to_rfc3339(),
            last.timestamp().to_rfc3339()
        ));
    }
    md.push_str(&format!("| Bucket Size | {} |\n", run.config.bucket_size));
    md.push_str(&format!(
        "| Maintenance Margin | {} |\n",
        run.config.maintenance_margin_rate
    ));
    md.push_str(&format!("| Config Hash | {} |\n", run.fingerprint.config_hash));
    md.push_str(&format!("| Dataset Hash | {} |\n", run.fingerprint.dataset_hash));
    if run.unmatched_oi > 0 {
        md.push_str(&format!(
            "| Candles Without OI | **{}** |\n",
            run.unmatched_oi
        ));
    }
    md.push('\n');

    md.push_str("## Lifecycle\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Positions Created | {} |\n", run.totals.positions_created));
    md.push_str(&format!(
        "| Positions Liquidated | {} |\n",
        run.totals.positions_consumed
    ));
    md.push_str(&format!(
        "| Positions Dropped (dust) | {} |\n",
        run.totals.positions_dropped
    ));
    md.push_str(&format!(
        "| Active at End | {} |\n",
        run.final_active_positions
    ));
    md.push_str(&format!("| Active Volume | {} |\n", run.final_active_volume));
    md.push('\n');

    if let Some(last) = run.last_snapshot() {
        let top = last.top_levels(REPORT_TOP_LEVELS);
        if !top.is_empty() {
            md.push_str("## Densest Levels (final snapshot)\n\n");
            md.push_str("| Price | Long | Short | Total |\n");
            md.push_str("| ---: | ---: | ---: | ---: |\n");
            for cell in top {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    cell.price,
                    cell.long_density,
                    cell.short_density,
                    cell.total_density()
                ));
            }
            md.push('\n');
        }
    }

    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one run.
///
/// Creates `{symbol}_{run_id}/` under `output_dir` containing:
/// - `manifest.json`: the full `HeatmapRun`
/// - `levels.csv`: non-empty cells of every snapshot
/// - `summary.csv`: per-candle totals
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(run: &HeatmapRun, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("{}_{}", run.symbol(), run.fingerprint.run_id());
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(run)?)?;
    std::fs::write(run_dir.join("levels.csv"), export_levels_csv(run)?)?;
    std::fs::write(run_dir.join("summary.csv"), export_summary_csv(run)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(run))?;

    Ok(run_dir)
}

/// Load a `HeatmapRun` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<HeatmapRun> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run_from_data;
    use chrono::{Duration, TimeZone, Utc};
    use liqmap_core::domain::Candle;
    use liqmap_core::engine::EngineConfig;
    use rust_decimal_macros::dec;

    fn sample_run() -> HeatmapRun {
        let base = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
        let candles = vec![
            Candle::new(base, dec!(99500), dec!(100200), dec!(99400), dec!(100000)),
            Candle::new(
                base + Duration::minutes(5),
                dec!(100000),
                dec!(100100),
                dec!(98900),
                dec!(99000),
            ),
        ];
        run_from_data(
            "BTCUSDT",
            &candles,
            &[dec!(1000000), dec!(200000)],
            &EngineConfig::default(),
        )
        .unwrap()
    }

    // ─── JSON ───────────────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let original = sample_run();
        let json = export_json(&original).unwrap();
        let restored = import_json(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn json_decimals_are_strings() {
        let json = export_json(&sample_run()).unwrap();
        assert!(json.contains("\"final_active_volume\": \""));
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut run = sample_run();
        run.schema_version = 99;
        let json = export_json(&run).unwrap();
        let msg = import_json(&json).unwrap_err().to_string();
        assert!(msg.contains("unsupported schema version 99"));
    }

    // ─── CSV ────────────────────────────────────────────────────────

    #[test]
    fn levels_csv_has_one_row_per_non_empty_cell() {
        let run = sample_run();
        let csv = export_levels_csv(&run).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,symbol,price,long_density,short_density"
        );
        let expected: usize = run
            .snapshots
            .iter()
            .map(|s| s.non_zero_levels().count())
            .sum();
        assert_eq!(lines.len(), expected + 1);
        assert!(lines[1..].iter().all(|l| l.contains(",BTCUSDT,")));
    }

    #[test]
    fn summary_csv_has_one_row_per_snapshot() {
        let run = sample_run();
        let csv = export_summary_csv(&run).unwrap();
        assert_eq!(csv.lines().count(), run.snapshots.len() + 1);
    }

    // ─── Markdown ───────────────────────────────────────────────────

    #[test]
    fn report_lists_totals_and_levels() {
        let md = generate_report(&sample_run());
        assert!(md.starts_with("# Liquidation Heatmap: BTCUSDT"));
        assert!(md.contains("| Positions Created | 10 |"));
        assert!(md.contains("## Densest Levels"));
    }

    // ─── Artifacts ──────────────────────────────────────────────────

    #[test]
    fn artifacts_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let run = sample_run();
        let run_dir = save_artifacts(&run, dir.path()).unwrap();
        for file in ["manifest.json", "levels.csv", "summary.csv", "report.md"] {
            assert!(run_dir.join(file).exists(), "missing {file}");
        }
        assert_eq!(load_artifacts(&run_dir).unwrap(), run);
    }
}
