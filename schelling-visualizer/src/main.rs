use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use image::{ImageBuffer, Rgba, RgbaImage};
use log::{debug, info, warn, LevelFilter};
use palette::{FromColor, Hsv, Srgb};
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use schelling_common::{
    threshold_fraction, ExperimentConfig, ThresholdStats, RANDOM_RATIO_TOLERANCE, RATIO_TOLERANCE,
};
use schelling_engine::output::read_report;
use schelling_engine::{random_ratios, Grid, RoundEngine, EMPTY};
use std::path::{Path, PathBuf};

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plot min / average / max segregation against the similarity threshold
    Chart {
        /// Sweep report written by schelling-engine (.json, .bin or .msgpack)
        #[arg(short, long)]
        input: PathBuf,

        /// Output image path (.png)
        #[arg(short, long, default_value = "threshold_chart.png")]
        output: PathBuf,

        /// Width of the chart in pixels
        #[arg(long, default_value_t = 1024)]
        width: u32,

        /// Height of the chart in pixels
        #[arg(long, default_value_t = 768)]
        height: u32,
    },
    /// Run a single simulation and render the board before and after
    Board {
        /// Experiment configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Similarity threshold in [0, 1]
        #[arg(short, long, default_value_t = 0.3)]
        threshold: f64,

        /// Seed for population and relocation (falls back to [engine] seed, then entropy)
        #[arg(long)]
        seed: Option<u64>,

        /// Output files are <prefix>_initial.png and <prefix>_final.png
        #[arg(short, long, default_value = "board")]
        output_prefix: String,

        /// Side of one grid cell in pixels
        #[arg(long, default_value_t = 8)]
        cell_px: u32,

        /// Colour of empty cells
        #[arg(long, default_value = "white")]
        bg_color: String,
    },
}

// Color definitions for named colors (RGBA format)
const COLOR_MAP: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
];

/// Parse a color name to RGBA values
fn parse_color(color_name: &str) -> [u8; 4] {
    for &(name, color) in COLOR_MAP {
        if name.eq_ignore_ascii_case(color_name) {
            return color;
        }
    }
    // Default to white if color not found
    warn!("Color '{}' not recognized, using white.", color_name);
    [255, 255, 255, 255]
}

/// One colour per race, hues spread evenly around the wheel.
fn race_palette(races: usize) -> Vec<[u8; 4]> {
    (0..races)
        .map(|i| {
            let hue = i as f32 / races.max(1) as f32;
            let rgb = Srgb::from_color(Hsv::new(hue * 360.0, 0.75, 0.85));
            [
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
                255,
            ]
        })
        .collect()
}

/// Draws every cell as a `cell_px` square.
fn render_grid(grid: &Grid, cell_px: u32, empty_color: [u8; 4], palette: &[[u8; 4]]) -> RgbaImage {
    let cell_px = cell_px.max(1);
    let width = grid.width() as u32 * cell_px;
    let height = grid.height() as u32 * cell_px;
    ImageBuffer::from_fn(width, height, |x, y| {
        let race = grid
            .get((y / cell_px) as usize, (x / cell_px) as usize)
            .unwrap_or(EMPTY);
        let color = match race {
            EMPTY => empty_color,
            r => palette.get(r as usize - 1).copied().unwrap_or([0, 0, 0, 255]),
        };
        Rgba(color)
    })
}

fn plot_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("Plotting failed: {}", e)
}

/// Draws the three threshold curves into a PNG.
fn draw_chart(stats: &ThresholdStats, path: &Path, size: (u32, u32)) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Segregation vs. similarity threshold", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..1.0f64, 0.0f64..1.0f64)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Similarity Threshold")
        .y_desc("Same-race neighbour ratio")
        .draw()
        .map_err(plot_error)?;

    let series = [("Min", &stats.min), ("Average", &stats.mean), ("Max", &stats.max)];
    for (i, (label, values)) in series.iter().enumerate() {
        let color = Palette99::pick(i).mix(0.9);
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(idx, value)| (threshold_fraction(idx), *value))
            .collect();
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(plot_error)?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

fn run_chart(input: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
    info!("Reading sweep report: {}", input.display());
    let report = read_report(input)?;
    info!(
        "Report: {}x{} grid, depth {}, {} simulations per threshold, seed {}{}",
        report.width,
        report.height,
        report.neighbour_depth,
        report.simulations,
        report.seed,
        if report.random { ", random ratios" } else { "" }
    );

    draw_chart(&report.stats, output, (width, height))?;
    info!("Chart saved to {}", output.display());
    Ok(())
}

fn run_board(
    config_path: &Path,
    threshold: f64,
    seed: Option<u64>,
    output_prefix: &str,
    cell_px: u32,
    bg_color: &str,
) -> Result<()> {
    let config = ExperimentConfig::load(config_path)
        .with_context(|| format!("Invalid configuration '{}'", config_path.display()))?;
    let seed = seed.or(config.engine.seed).unwrap_or_else(rand::random);
    info!("Seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let (sim_config, tolerance) = if config.random {
        let ratios = random_ratios(config.numberraces, &mut rng);
        info!("Random ratios: empty {:.2}, races {:?}", ratios.empty_ratio, ratios.race_ratios);
        let sim = config.simulation_with_ratios(threshold, ratios.empty_ratio, ratios.race_ratios);
        (sim, RANDOM_RATIO_TOLERANCE)
    } else {
        (config.base_simulation(threshold)?, RATIO_TOLERANCE)
    };

    let mut engine = RoundEngine::with_tolerance(&sim_config, tolerance, config.engine.update_mode, rng)?;
    let palette = race_palette(sim_config.race_count());
    let empty_color = parse_color(bg_color);

    let initial_path = format!("{}_initial.png", output_prefix);
    render_grid(engine.grid(), cell_px, empty_color, &palette)
        .save(&initial_path)
        .with_context(|| format!("Failed to write {}", initial_path))?;
    let initial_metric = engine.segregation();
    debug!("Initial board:\n{}", engine.grid());

    let summary = engine.run_to_convergence(config.maxniterations);
    info!(
        "Ran {} rounds: {:?}; segregation {:.4} -> {:.4}",
        summary.rounds,
        summary.state,
        initial_metric,
        engine.segregation()
    );
    debug!("Final board:\n{}", engine.grid());

    let final_path = format!("{}_final.png", output_prefix);
    render_grid(engine.grid(), cell_px, empty_color, &palette)
        .save(&final_path)
        .with_context(|| format!("Failed to write {}", final_path))?;
    info!("Boards saved to {} and {}", initial_path, final_path);
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    match args.command {
        Command::Chart {
            input,
            output,
            width,
            height,
        } => run_chart(&input, &output, width, height),
        Command::Board {
            config,
            threshold,
            seed,
            output_prefix,
            cell_px,
            bg_color,
        } => run_board(&config, threshold, seed, &output_prefix, cell_px, &bg_color),
    }
}
