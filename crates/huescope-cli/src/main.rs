//! `huescope`: run image diagnostics on a file and print the results as JSON.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use huescope_core::{PaletteStrategy, SourceImage};
use huescope_engine::{AnalysisConfig, AnalysisEngine, AnalysisError, AnalysisMode};
use tracing::Level;

/// Environment override for the default palette seed.
const SEED_ENV: &str = "HUESCOPE_SEED";

#[derive(Parser)]
#[command(name = "huescope")]
#[command(version, long_about = None)]
#[command(about = "Histogram, vectorscope, waveform, saliency and palette diagnostics")]
struct Cli {
    /// Image file to analyze
    #[arg(value_name = "IMAGE")]
    input: PathBuf,

    /// Analyses to run (repeatable)
    #[arg(short, long, value_enum, default_value = "histogram")]
    mode: Vec<ModeArg>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of dominant colors (4-8)
    #[arg(short = 'k', long, value_name = "K")]
    palette_size: Option<usize>,

    /// Palette extraction strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Seed for palette sampling [env: HUESCOPE_SEED]
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Vectorscope grid size
    #[arg(long, value_name = "N")]
    grid_size: Option<u32>,

    /// Leave saliency scores unnormalized
    #[arg(long)]
    raw_saliency: bool,

    /// Write JSON here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,

    /// Log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Histogram,
    Vectorscope,
    Waveform,
    Saliency,
    DominantColors,
    All,
}

impl ModeArg {
    fn modes(self) -> &'static [AnalysisMode] {
        match self {
            ModeArg::Histogram => &[AnalysisMode::Histogram],
            ModeArg::Vectorscope => &[AnalysisMode::Vectorscope],
            ModeArg::Waveform => &[AnalysisMode::Waveform],
            ModeArg::Saliency => &[AnalysisMode::Saliency],
            ModeArg::DominantColors => &[AnalysisMode::DominantColors],
            ModeArg::All => &AnalysisMode::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Kmeans,
    Vote,
}

impl From<StrategyArg> for PaletteStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Kmeans => PaletteStrategy::KMeans,
            StrategyArg::Vote => PaletteStrategy::Vote,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("failed to encode results: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = build_config(cli)?;
    let image = load_image(&cli.input)?;
    tracing::info!(
        path = %cli.input.display(),
        width = image.width(),
        height = image.height(),
        "image loaded"
    );

    let mut modes: Vec<AnalysisMode> = Vec::new();
    for arg in &cli.mode {
        for &mode in arg.modes() {
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
    }

    let mut engine = AnalysisEngine::new(config)?;
    let mut report = serde_json::Map::new();
    for mode in modes {
        engine.set_mode(mode);
        let output = engine.analyze(&image)?;
        report.insert(mode.name().to_string(), serde_json::to_value(output)?);
    }
    engine.release();

    let report = serde_json::Value::Object(report);
    let text = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    match &cli.out {
        Some(path) => std::fs::write(path, text).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?,
        None => println!("{text}"),
    }
    Ok(())
}

/// The config file (or defaults seeded from the environment), then flags.
fn build_config(cli: &Cli) -> Result<AnalysisConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            AnalysisConfig::from_json_str(&json)?
        }
        None => {
            let mut config = AnalysisConfig::default();
            if let Some(seed) = env_seed() {
                config.palette.seed = seed;
            }
            config
        }
    };

    if let Some(size) = cli.palette_size {
        config.palette.size = size;
    }
    if let Some(strategy) = cli.strategy {
        config.palette.strategy = strategy.into();
    }
    if let Some(seed) = cli.seed {
        config.palette.seed = seed;
    }
    if let Some(grid) = cli.grid_size {
        config.vectorscope.grid_size = grid;
    }
    if cli.raw_saliency {
        config.saliency.normalize = false;
    }

    config.validate()?;
    Ok(config)
}

fn env_seed() -> Option<u64> {
    std::env::var(SEED_ENV).ok().and_then(|s| s.trim().parse().ok())
}

fn load_image(path: &Path) -> Result<SourceImage, CliError> {
    let decoded = image::open(path).map_err(|source| CliError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SourceImage::from_dynamic(&decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "huescope",
            "frame.png",
            "--mode",
            "dominant-colors",
            "-k",
            "6",
            "--strategy",
            "vote",
            "--seed",
            "99",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.palette.size, 6);
        assert_eq!(config.palette.strategy, PaletteStrategy::Vote);
        assert_eq!(config.palette.seed, 99);
        assert_eq!(cli.mode, vec![ModeArg::DominantColors]);
    }

    #[test]
    fn test_invalid_palette_size_rejected() {
        let cli = Cli::parse_from(["huescope", "frame.png", "-k", "2"]);
        assert!(matches!(build_config(&cli), Err(CliError::Analysis(_))));
    }

    #[test]
    fn test_all_expands_every_mode() {
        assert_eq!(ModeArg::All.modes().len(), AnalysisMode::ALL.len());
    }
}
