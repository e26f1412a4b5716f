//! `touchline analyze`: run an attribution analysis over a journey file

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};
use touchline_core::{AnalysisOptions, AttributionEngine, AttributionResult, EngineConfig};

use crate::config::ConfigLoader;
use crate::input::{self, AnalysisRequest};
use crate::output::{self, Format};

/// Exit code used when the caller-imposed timeout fires
const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Journey JSON file (array or request object), `-` for stdin
    pub input: PathBuf,

    /// Blend weight: 0 = Markov only, 1 = Shapley only
    #[arg(short, long)]
    pub alpha: Option<f64>,

    /// Only analyze journeys touching one of these channels
    #[arg(short, long, value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Skip confidence intervals
    #[arg(long)]
    pub no_uncertainty: bool,

    /// RNG seed for reproducible Shapley sampling and bootstrap
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum Shapley permutations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,
}

pub async fn run(args: AnalyzeArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }

    let request = input::load_request(&args.input)?;
    let options = resolve_options(&config, &args, &request);
    let engine = AttributionEngine::new(config).context("invalid engine configuration")?;

    let result = match args.timeout_secs {
        Some(secs) => run_with_timeout(engine, request, options, secs).await?,
        None => tokio::task::spawn_blocking(move || {
            engine.run_analysis(&request.journeys, &options)
        })
        .await??,
    };

    info!(
        model = result.model.name(),
        elapsed_ms = result.processing_time_ms,
        "analysis finished"
    );

    match args.format {
        Format::Json => output::print_json(&result),
        Format::Table => {
            print_summary(&result);
            Ok(())
        }
    }
}

/// Precedence: command-line flag, then request object, then config
fn resolve_options(
    config: &EngineConfig,
    args: &AnalyzeArgs,
    request: &AnalysisRequest,
) -> AnalysisOptions {
    let mut options = AnalysisOptions::from_config(config);
    if let Some(alpha) = args.alpha.or(request.alpha) {
        options.alpha = alpha;
    }
    if let Some(include) = request.include_uncertainty {
        options.include_uncertainty = include;
    }
    if args.no_uncertainty {
        options.include_uncertainty = false;
    }
    if !args.filter.is_empty() {
        options.filter_channels = Some(args.filter.clone());
    } else if request.filter_channels.is_some() {
        options.filter_channels = request.filter_channels.clone();
    }
    if let Some(seed) = args.seed {
        options.seed = Some(seed);
    }
    options
}

async fn run_with_timeout(
    engine: AttributionEngine,
    request: AnalysisRequest,
    options: AnalysisOptions,
    secs: u64,
) -> Result<AttributionResult> {
    let handle =
        tokio::task::spawn_blocking(move || engine.run_analysis(&request.journeys, &options));

    match tokio::time::timeout(Duration::from_secs(secs), handle).await {
        Ok(joined) => Ok(joined??),
        Err(_) => {
            // The blocking worker cannot be cancelled and the runtime would
            // wait for it on shutdown.
            error!(timeout_secs = secs, "analysis timed out");
            eprintln!("Error: analysis did not finish within {}s", secs);
            std::process::exit(TIMEOUT_EXIT_CODE);
        }
    }
}

fn print_summary(result: &AttributionResult) {
    println!(
        "Model: {}    Journeys: {}    Conversions: {}    Channels: {}",
        result.model.name(),
        result.total_journeys,
        result.total_conversions,
        result.unique_channels
    );
    println!();

    if result.channel_metrics.is_empty() {
        println!("No channels to attribute.");
    } else {
        println!("{}", output::attribution_table(result));
    }

    println!();
    println!("Note: {}", result.interpretation);
}
