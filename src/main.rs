use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;

use chromaband_lib::config::Config;
use chromaband_lib::image_io::load_raster;
use chromaband_lib::pipeline::process_image;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "chromaband - Chromatographic band quantification")]
struct Args {
    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Image to analyze (overrides config)
    #[clap(short, long)]
    image: Option<String>,

    /// Output directory (overrides config)
    #[clap(short, long)]
    output: Option<String>,

    /// Pixels averaged across the path (overrides config)
    #[clap(short, long)]
    band_width: Option<usize>,

    /// Treat bright bands as peaks instead of dark ones
    #[clap(long)]
    no_invert: bool,

    /// Enable debug logging and print the analysis report
    #[clap(short, long)]
    debug: bool,

    /// Write a default configuration to the --config path and exit
    #[clap(long)]
    write_default_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if args.write_default_config {
        Config::default()
            .save_to_file(&args.config)
            .with_context(|| format!("writing default config to {}", args.config))?;
        log::info!("Default configuration written to {}", args.config);
        return Ok(());
    }

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("loading config {}", args.config))?;

    // Override config with command-line arguments
    if let Some(image) = args.image {
        config.image_path = image;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(band_width) = args.band_width {
        config.band_width = band_width;
    }
    if args.no_invert {
        config.invert = false;
    }

    config.validate().context("invalid configuration")?;

    let image_path = PathBuf::from(&config.image_path);
    if !image_path.is_file() {
        bail!("input image {} does not exist", image_path.display());
    }

    let start_time = Instant::now();

    let input = load_raster(&image_path)
        .with_context(|| format!("loading image {}", image_path.display()))?;
    let (lanes, files) = process_image(input, &config, args.debug)?;

    for (lane, written) in lanes.iter().zip(&files.lanes) {
        log::info!(
            "Lane {}: {} peak(s), {} integration(s), {} fit(s); CSV at {}",
            lane.label,
            lane.analysis.peaks().len(),
            lane.analysis.integrations().len(),
            lane.analysis.fits().len(),
            written.csv.display()
        );
        if let Some(json) = &written.json {
            log::info!("JSON summary at {}", json.display());
        }
    }
    if let Some(comparison) = &files.comparison {
        log::info!("Lane comparison at {}", comparison.display());
    }
    log::info!("Processing completed in {:.2} seconds", start_time.elapsed().as_secs_f64());

    Ok(())
}
