use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use derma_vision::{
    AnalysisRequest, AnalyzerConfig, CompleteAnalysisResult, ParallelPipeline, RecommendationParameters,
    SkinAnalysisPipeline, load_image, recommend_from_parameters,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "derma_vision")]
#[command(about = "Skin condition, mole and skin-tone analysis of photographs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one or more images and print one JSON document per image
    Analyze {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// JSON file overriding the default tunables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run only the given analyses (repeatable); all by default
        #[arg(long, value_enum)]
        only: Vec<Analysis>,

        /// Number of images analysed at once (default: logical CPUs)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print recommendations for known scores without analysing an image
    Recommend {
        #[arg(long)]
        hydration: Option<f64>,
        #[arg(long)]
        texture: Option<f64>,
        #[arg(long)]
        pores: Option<f64>,
        #[arg(long)]
        oiliness: Option<f64>,
        /// Fitzpatrick type, 1-6
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=6))]
        fitzpatrick_type: Option<u8>,
        #[arg(long)]
        suspicious_moles: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Analysis {
    Condition,
    Lesions,
    Tone,
}

#[derive(Serialize)]
struct ImageReport<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a CompleteAnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn build_request(only: &[Analysis]) -> AnalysisRequest {
    if only.is_empty() {
        return AnalysisRequest::all();
    }
    only.iter().fold(AnalysisRequest::none(), |request, analysis| match analysis {
        Analysis::Condition => request.with_condition(),
        Analysis::Lesions => request.with_lesions(),
        Analysis::Tone => request.with_tone(),
    })
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn analyze(
    images: Vec<PathBuf>,
    config: Option<PathBuf>,
    only: Vec<Analysis>,
    workers: Option<usize>,
    pretty: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => AnalyzerConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    let request = build_request(&only);

    let pipeline = SkinAnalysisPipeline::new(config, None);
    let parallel = match workers {
        Some(workers) => ParallelPipeline::with_workers(pipeline, workers),
        None => ParallelPipeline::new(pipeline),
    };
    info!(
        images = images.len(),
        workers = parallel.worker_count(),
        classifier = parallel.pipeline().classifier_strategy(),
        "starting analysis"
    );

    // Decode up front; unreadable files are reported and skipped.
    let mut decoded = Vec::new();
    let mut failures = 0usize;
    for path in &images {
        match load_image(path) {
            Ok(image) => decoded.push((path, image)),
            Err(error) => {
                warn!(image = %path.display(), %error, "skipping image");
                failures += 1;
                let report = ImageReport {
                    image: path.display().to_string(),
                    result: None,
                    error: Some(error.to_string()),
                };
                println!("{}", to_json(&report, pretty)?);
            }
        }
    }

    let (paths, buffers): (Vec<_>, Vec<_>) = decoded.into_iter().unzip();
    let outcomes = parallel.analyze_batch(buffers, request).await;
    for (path, outcome) in paths.into_iter().zip(outcomes) {
        let report = match &outcome {
            Ok(result) => ImageReport {
                image: path.display().to_string(),
                result: Some(result),
                error: None,
            },
            Err(error) => {
                failures += 1;
                ImageReport {
                    image: path.display().to_string(),
                    result: None,
                    error: Some(error.to_string()),
                }
            }
        };
        println!("{}", to_json(&report, pretty)?);
    }

    parallel.shutdown().await?;
    if failures > 0 {
        bail!("{} of {} images could not be analysed", failures, images.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze { images, config, only, workers, pretty } => {
            analyze(images, config, only, workers, pretty).await?;
        }
        Commands::Recommend { hydration, texture, pores, oiliness, fitzpatrick_type, suspicious_moles } => {
            let parameters = RecommendationParameters {
                hydration,
                texture,
                pores,
                oiliness,
                fitzpatrick_type,
                has_suspicious_moles: suspicious_moles,
            };
            for tip in recommend_from_parameters(&parameters).context("invalid recommendation parameters")? {
                println!("{}", tip);
            }
        }
    }

    Ok(())
}
