//! `touchline compare`: check model credit against known channel effects

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use touchline_core::{
    AttributionEngine, Baseline, ConfidenceBounds, HybridInterval, ModelOutput,
    UncertaintyConfig, ValidationReport,
};
use tracing::info;

use crate::config::ConfigLoader;
use crate::input;
use crate::output::{self, Format};

/// Nominal coverage of the Markov bounds, which are always ±1.96 SE
const MARKOV_INTERVAL_LEVEL: f64 = 0.95;

#[derive(Args)]
pub struct CompareArgs {
    /// Journey JSON file (array or request object), `-` for stdin
    pub input: PathBuf,

    /// JSON object mapping each channel to its true effect
    #[arg(short, long)]
    pub truth: PathBuf,

    #[arg(short, long)]
    pub alpha: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,
}

pub fn run(args: CompareArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let half_life_days = config.baselines.half_life_days;
    let uncertainty = config.uncertainty.clone();

    let request = input::load_request(&args.input)?;
    let truth = input::load_channel_map(&args.truth)?;
    let engine = AttributionEngine::new(config)?;

    let mut options = engine.options();
    if let Some(alpha) = args.alpha.or(request.alpha) {
        options.alpha = alpha;
    }
    if let Some(seed) = args.seed {
        options.seed = Some(seed);
    }

    let result = engine.run_analysis(&request.journeys, &options)?;
    let (intervals, expected_coverage) = calibration_inputs(&result.model, &uncertainty);
    let report = ValidationReport::build(
        result.model.attributions(),
        intervals,
        expected_coverage,
        &request.journeys,
        &truth,
        &Baseline::standard(half_life_days),
    )
    .context("ground truth shares too few channels with the analysis")?;

    info!(
        model = result.model.name(),
        outperforms_baselines = report.outperforms_baselines(),
        "validation complete"
    );

    match args.format {
        Format::Json => output::print_json(&report),
        Format::Table => {
            print!("{}", report);
            Ok(())
        }
    }
}

/// Intervals worth calibrating and the coverage they claim
///
/// Fixed-width hybrid bounds have no nominal level, so they are left out.
fn calibration_inputs<'a>(
    model: &'a ModelOutput,
    uncertainty: &UncertaintyConfig,
) -> (Option<&'a BTreeMap<String, ConfidenceBounds>>, f64) {
    let level = match model {
        ModelOutput::Markov(_) => MARKOV_INTERVAL_LEVEL,
        ModelOutput::Hybrid(_) => match uncertainty.hybrid_interval {
            HybridInterval::Bootstrap => uncertainty.confidence_level,
            HybridInterval::FixedWidth { .. } => return (None, uncertainty.confidence_level),
        },
        ModelOutput::Shapley(_) => return (None, uncertainty.confidence_level),
    };
    (model.confidence_intervals(), level)
}
