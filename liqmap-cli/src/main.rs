//! liqmap CLI: run liquidation heatmap simulations and inspect configuration.
//!
//! Commands:
//! - `run`: simulate one symbol from the command line, or every `[[jobs]]`
//!   entry of a TOML config in parallel, and save artifacts
//! - `defaults`: print the default configuration as TOML
//! - `validate-config`: parse and validate a TOML config file

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use liqmap_runner::{run_jobs, save_artifacts, HeatmapFileConfig, HeatmapRun, JobSpec};

#[derive(Parser)]
#[command(
    name = "liqmap",
    about = "liqmap: time-evolving liquidation heatmap simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run heatmap simulations and write artifacts.
    Run {
        /// Path to a TOML config file. Its `[[jobs]]` run unless --symbol is given.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbol for a single ad-hoc run (requires --candles).
        #[arg(long, requires = "candles")]
        symbol: Option<String>,

        /// Candle CSV: open_time,open,high,low,close[,oi_delta].
        #[arg(long)]
        candles: Option<PathBuf>,

        /// Open-interest CSV: timestamp,open_interest. Without it the candle
        /// file must carry an oi_delta column.
        #[arg(long)]
        oi: Option<PathBuf>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Also print the final snapshot of each run as JSON on stdout.
        #[arg(long, default_value_t = false)]
        print_final: bool,
    },
    /// Print the default configuration as TOML.
    Defaults,
    /// Parse and validate a TOML config file.
    ValidateConfig {
        /// Path to the config file.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            symbol,
            candles,
            oi,
            output_dir,
            print_final,
        } => run_cmd(config, symbol, candles, oi, output_dir, print_final),
        Commands::Defaults => defaults_cmd(),
        Commands::ValidateConfig { path } => validate_cmd(&path),
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    candles: Option<PathBuf>,
    oi: Option<PathBuf>,
    output_dir: PathBuf,
    print_final: bool,
) -> Result<()> {
    let file_config = match &config_path {
        Some(path) => HeatmapFileConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HeatmapFileConfig::default(),
    };

    let jobs = match (symbol, candles) {
        (Some(symbol), Some(candles)) => vec![JobSpec {
            symbol,
            candles,
            open_interest: oi,
        }],
        (None, None) if !file_config.jobs.is_empty() => file_config.jobs.clone(),
        (None, Some(_)) => bail!("--candles requires --symbol"),
        _ => bail!("nothing to run: pass --symbol and --candles, or a --config with [[jobs]]"),
    };

    info!(jobs = jobs.len(), "starting runs");
    let results = run_jobs(&jobs, &file_config);

    let mut failures = 0usize;
    for (symbol, result) in results {
        match result {
            Ok(run) => {
                print_summary(&run);
                let run_dir = save_artifacts(&run, &output_dir)?;
                println!("Artifacts saved to: {}", run_dir.display());
                if print_final {
                    if let Some(last) = run.last_snapshot() {
                        println!("{}", serde_json::to_string_pretty(last)?);
                    }
                }
            }
            Err(e) => {
                eprintln!("Error for {symbol}: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} runs failed", jobs.len());
    }
    Ok(())
}

fn print_summary(run: &HeatmapRun) {
    println!();
    println!("=== {} ===", run.symbol());
    println!("Run ID:               {}", run.fingerprint.run_id());
    println!("Candles:              {}", run.candle_count);
    if run.unmatched_oi > 0 {
        println!("Candles without OI:   {}", run.unmatched_oi);
    }
    println!("Positions created:    {}", run.totals.positions_created);
    println!("Positions liquidated: {}", run.totals.positions_consumed);
    println!("Positions dropped:    {}", run.totals.positions_dropped);
    println!("Active at end:        {}", run.final_active_positions);
    println!("Active volume:        {}", run.final_active_volume);
    if let Some(last) = run.last_snapshot() {
        for cell in last.top_levels(3) {
            println!(
                "  level {:>14}  long {:>16}  short {:>16}",
                cell.price, cell.long_density, cell.short_density
            );
        }
    }
}

fn defaults_cmd() -> Result<()> {
    let rendered = HeatmapFileConfig::default()
        .to_toml()
        .context("failed to render default config")?;
    print!("{rendered}");
    Ok(())
}

fn validate_cmd(path: &std::path::Path) -> Result<()> {
    let file_config = HeatmapFileConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let engine = file_config
        .engine_config()
        .with_context(|| format!("invalid engine settings in {}", path.display()))?;
    file_config
        .input
        .tolerance()
        .with_context(|| format!("invalid input settings in {}", path.display()))?;

    println!("Config OK: {}", path.display());
    println!("  bucket size:        {}", engine.bucket_size);
    println!("  maintenance margin: {}", engine.maintenance_margin_rate);
    println!("  same-candle policy: {:?}", engine.same_candle_policy);
    println!("  side inference:     {:?}", engine.side_inference);
    for row in engine.weights.rows() {
        println!("  tier {:>4}x -> {}", row.leverage, row.fraction);
    }
    println!(
        "  OI tolerance:       {}s",
        file_config.input.alignment_tolerance_secs
    );
    println!("  jobs:               {}", file_config.jobs.len());
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        // stdout carries summaries and JSON
        .with_writer(std::io::stderr)
        .init()
}
