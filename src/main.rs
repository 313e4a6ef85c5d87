use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use schelling_common::ExperimentConfig;
use schelling_engine::output::{save_outputs, write_stats_csv};
use schelling_engine::ExperimentDriver;

/// Sweeps the similarity threshold of a Schelling segregation model and
/// reports min/mean/max segregation per threshold.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Experiment configuration file (TOML)
    config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    let args = Args::parse();
    let Some(config_path) = args.config else {
        println!("{}", Args::command().render_usage());
        return Ok(());
    };

    info!("Starting Schelling Engine...");

    // --- Load Configuration ---
    let config = ExperimentConfig::load(&config_path)
        .with_context(|| format!("Invalid configuration '{}'", config_path.display()))?;
    info!(
        "Loaded {}: {}x{} grid, depth {}, {} simulations per threshold, cap {} rounds, {} ratios",
        config_path.display(),
        config.popwidth,
        config.popheight,
        config.ndepth,
        config.nsimulations,
        config.maxniterations,
        if config.random { "random" } else { "fixed" }
    );
    debug!("Configuration: {:#?}", config);

    let driver = ExperimentDriver::from_config(&config)?;
    info!("Seed: {} (set [engine] seed to replay this sweep)", driver.seed());
    if config.engine.parallel {
        info!("Using {} Rayon threads.", rayon::current_num_threads());
    }

    // --- Sweep ---
    let progress_bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(driver.total_units() as u64)
    };
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} simulations ({percent}%) [{eta}]")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let matrix = driver.run_with_progress(&|done| progress_bar.set_position(done as u64))?;
    progress_bar.finish_and_clear();
    let total_duration = start_time.elapsed();
    info!(
        "Sweep finished in {:.3} seconds ({} simulations).",
        total_duration.as_secs_f64(),
        driver.total_units()
    );

    let report = driver.report(matrix);

    // --- Principal output: the per-threshold statistics ---
    write_stats_csv(&report.stats, io::stdout().lock())?;

    // --- Save Recorded Data ---
    info!("Saving results...");
    save_outputs(&report, &config.output)?;

    info!("Sweep Complete.");
    Ok(())
}
