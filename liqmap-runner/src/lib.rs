//! liqmap runner: heatmap run orchestration, input loading, export.
//!
//! This crate builds on `liqmap-core` to provide:
//! - TOML run configuration with engine, input, and job tables
//! - Candle/OI CSV loading with nearest-timestamp OI alignment
//! - Single-run and parallel multi-symbol orchestration
//! - Run fingerprints, JSON/CSV/Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{ConfigError, EngineSection, HeatmapFileConfig, InputSection, JobSpec};
pub use data_loader::{
    align_oi_deltas, load_input, read_candles, read_candles_with_deltas, read_open_interest,
    InputSource, LoadError, LoadedInput, OiSample,
};
pub use export::{
    export_json, export_levels_csv, export_summary_csv, generate_report, import_json,
    load_artifacts, save_artifacts,
};
pub use runner::{run_from_data, run_job, run_jobs, HeatmapRun, RunError, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn heatmap_run_is_send_sync() {
        assert_send::<HeatmapRun>();
        assert_sync::<HeatmapRun>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<HeatmapFileConfig>();
        assert_sync::<HeatmapFileConfig>();
        assert_send::<JobSpec>();
        assert_sync::<JobSpec>();
    }

    #[test]
    fn run_error_is_send() {
        assert_send::<RunError>();
    }
}
