//! `touchline baselines`: model credit next to rule-based credit

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use touchline_core::{AttributionEngine, Baseline, ChannelShares};

use crate::config::ConfigLoader;
use crate::input;
use crate::output::{self, Format};

#[derive(Args)]
pub struct BaselinesArgs {
    /// Journey JSON file (array or request object), `-` for stdin
    pub input: PathBuf,

    /// Blend weight of the model column
    #[arg(short, long)]
    pub alpha: Option<f64>,

    /// Time-decay half-life in days
    #[arg(long)]
    pub half_life_days: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,
}

#[derive(Serialize)]
struct BaselineComparison {
    model: &'static str,
    model_shares: ChannelShares,
    baselines: BTreeMap<&'static str, ChannelShares>,
}

pub fn run(args: BaselinesArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    if let Some(half_life_days) = args.half_life_days {
        config.baselines.half_life_days = half_life_days;
    }
    let half_life_days = config.baselines.half_life_days;

    let request = input::load_request(&args.input)?;
    let engine = AttributionEngine::new(config)?;

    let mut options = engine.options().without_uncertainty();
    if let Some(alpha) = args.alpha.or(request.alpha) {
        options.alpha = alpha;
    }
    if let Some(seed) = args.seed {
        options.seed = Some(seed);
    }

    let result = engine.run_analysis(&request.journeys, &options)?;
    let comparison = BaselineComparison {
        model: result.model.name(),
        model_shares: result.model.attributions().clone(),
        baselines: Baseline::standard(half_life_days)
            .iter()
            .map(|b| (b.name(), b.attribute(&request.journeys)))
            .collect(),
    };

    match args.format {
        Format::Json => output::print_json(&comparison),
        Format::Table => {
            let mut columns: Vec<(&str, &ChannelShares)> =
                vec![(comparison.model, &comparison.model_shares)];
            columns.extend(comparison.baselines.iter().map(|(name, s)| (*name, s)));
            println!("{}", output::shares_table(&columns));
            Ok(())
        }
    }
}
