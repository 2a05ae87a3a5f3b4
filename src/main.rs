// src/main.rs - Command-line entry point for batch root analysis

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use root_analysis_rust_lib::config::{AngleSearchKind, Config};
use root_analysis_rust_lib::logger::{self, info};
use root_analysis_rust_lib::BatchOrchestrator;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Batch morphometric analysis of plant root images")]
struct Args {
    /// Directory containing the root images
    #[clap(short, long)]
    input: Option<String>,

    /// Parameter CSV; the other output files are derived from it
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Roots are bright on a dark background (overwrites config)
    #[clap(long)]
    white_roots: bool,

    /// Append rotation angle and volume columns
    #[clap(long)]
    volume: bool,

    /// Rotation search strategy (overwrites config)
    #[clap(short = 'a', long)]
    angle_search: Option<AngleSearchArg>,

    /// Save skeleton and tip images
    #[clap(long)]
    save_images: bool,

    /// Process images on the rayon thread pool
    #[clap(short, long)]
    parallel: bool,

    /// Debug-level logging
    #[clap(short, long)]
    verbose: bool,

    /// Write the effective configuration to this file and exit
    #[clap(long)]
    save_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AngleSearchArg {
    HillClimb,
    FullScan,
}

/// Main function
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file_or_default(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    // Override config with command-line arguments
    if let Some(input) = args.input {
        config.input_path = input;
    }
    if let Some(output) = args.output {
        config.output_csv = output;
    }
    if args.white_roots {
        config.black_roots = false;
    }
    if args.volume {
        config.estimate_volume = true;
    }
    if let Some(kind) = args.angle_search {
        config.angle_search = match kind {
            AngleSearchArg::HillClimb => AngleSearchKind::HillClimb,
            AngleSearchArg::FullScan => AngleSearchKind::FullScan,
        };
    }
    config.save_images |= args.save_images;
    config.use_parallel |= args.parallel;
    config.verbose |= args.verbose;

    if let Some(path) = args.save_config {
        config
            .save_to_file(&path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    logger::init(config.verbose);
    info!("Input directory: {}", config.input_path);
    info!("Parameter CSV: {}", config.output_csv);

    let summary = BatchOrchestrator::new(&config)
        .run()
        .context("batch could not start")?;

    info!(
        "Processing completed in {:.2} seconds ({} of {} images)",
        summary.elapsed.as_secs_f64(),
        summary.processed,
        summary.total
    );

    Ok(())
}
