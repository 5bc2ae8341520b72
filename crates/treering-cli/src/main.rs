//! Command-line front end for growth-ring boundary extraction from cross-section images.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use treering::{
    detect_edge_curves, filter_by_orientation, DetectConfig, Detector, EdgeDetectConfig, EdgeMap,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "treering")]
#[command(about = "Extract annual growth-ring boundaries around a known pith location")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect edges in an image, then extract rings.
    Detect(CliDetectArgs),

    /// Extract rings from a precomputed edge map (JSON).
    Trace(CliTraceArgs),

    /// Print the default detection configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Pith location in pixels.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    center: Vec<f64>,

    /// Path to write detection results (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Detection config file (JSON); missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of rays.
    #[arg(long)]
    n_rays: Option<usize>,

    /// Path to write the converged chain set (JSON).
    #[arg(long)]
    chains_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    common: CommonArgs,

    /// Gaussian pre-blur sigma (0 disables).
    #[arg(long, default_value = "1.5")]
    sigma: f32,

    /// Canny low threshold.
    #[arg(long, default_value = "20.0")]
    low: f32,

    /// Canny high threshold.
    #[arg(long, default_value = "50.0")]
    high: f32,

    /// Drop linked edge curves shorter than this many pixels.
    #[arg(long, default_value = "5")]
    min_curve_len: usize,

    /// Keep only edge points whose gradient deviates from the radial direction
    /// by at most this angle (degrees).
    #[arg(long)]
    max_normal_deviation: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct CliTraceArgs {
    /// Edge map JSON (`{"image_size": [w, h], "curves": [{"points": [...]}, ...]}`).
    #[arg(long)]
    edges: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

impl CommonArgs {
    fn center(&self) -> CliResult<[f64; 2]> {
        match self.center.as_slice() {
            &[x, y] => Ok([x, y]),
            _ => Err("--center takes exactly two values".into()),
        }
    }

    fn detector(&self) -> CliResult<Detector> {
        let mut config = match &self.config {
            Some(path) => DetectConfig::from_json_file(path)?,
            None => DetectConfig::default(),
        };
        if let Some(n) = self.n_rays {
            config.n_rays = n;
        }
        Ok(Detector::with_config(config)?)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Trace(args) => run_trace(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&DetectConfig::default())?);
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());

    let img = image::open(&args.image).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", args.image.display(), e).into()
    })?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let center = args.common.center()?;
    let edge_cfg = EdgeDetectConfig {
        sigma: args.sigma,
        low_threshold: args.low,
        high_threshold: args.high,
        min_curve_len: args.min_curve_len,
    };
    let mut edges = detect_edge_curves(&gray, &edge_cfg);
    tracing::info!(
        "Linked {} edge curves ({} points)",
        edges.curves.len(),
        edges.point_count()
    );
    if let Some(max_dev) = args.max_normal_deviation {
        edges = filter_by_orientation(&edges, center, max_dev);
        tracing::info!(
            "Kept {} curves after orientation filter ({:.1} deg)",
            edges.curves.len(),
            max_dev
        );
    }

    run_pipeline(&edges, &args.common)
}

// ── trace ──────────────────────────────────────────────────────────────

fn run_trace(args: &CliTraceArgs) -> CliResult<()> {
    tracing::info!("Loading edge map: {}", args.edges.display());
    let data = std::fs::read_to_string(&args.edges).map_err(|e| -> CliError {
        format!("Failed to read edge map {}: {}", args.edges.display(), e).into()
    })?;
    let edges: EdgeMap = serde_json::from_str(&data)?;
    run_pipeline(&edges, &args.common)
}

// ── shared ─────────────────────────────────────────────────────────────

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn run_pipeline(edges: &EdgeMap, common: &CommonArgs) -> CliResult<()> {
    let center = common.center()?;
    let detector = common.detector()?;

    let result = match &common.chains_json {
        Some(path) => {
            let (result, chains) = detector.detect_with_chains(edges, center)?;
            write_json(path, &chains)?;
            tracing::info!("Chain set written to {}", path.display());
            result
        }
        None => detector.detect(edges, center)?,
    };

    tracing::info!(
        "Extracted {} rings ({} closed by interpolation, {} duplicates removed)",
        result.rings.len(),
        result.stats.completion.closed_by_interpolation,
        result.stats.duplicates_removed,
    );
    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }

    write_json(&common.out, &result)?;
    tracing::info!("Results written to {}", common.out.display());
    Ok(())
}
