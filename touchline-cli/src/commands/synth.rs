//! `touchline synth`: write a synthetic dataset with known effects

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use touchline_core::synthetic::{self, SyntheticConfig};

#[derive(Args)]
pub struct SynthArgs {
    /// Where to write the journey array
    #[arg(short, long)]
    pub output: PathBuf,

    /// Where to write the true channel effects
    #[arg(short, long)]
    pub truth: Option<PathBuf>,

    /// Number of journeys
    #[arg(short = 'n', long, default_value_t = 10_000)]
    pub journeys: usize,

    /// Standard deviation of the conversion probability noise
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn run(args: SynthArgs) -> Result<()> {
    let config = SyntheticConfig {
        journeys: args.journeys,
        noise_level: args.noise,
        seed: args.seed,
        ..Default::default()
    };
    let dataset = synthetic::generate(&config)?;

    write_json(&args.output, &dataset.journeys)?;
    println!(
        "Wrote {} journeys to {} (conversion rate {:.1}%)",
        dataset.journeys.len(),
        args.output.display(),
        dataset.conversion_rate() * 100.0
    );

    if let Some(truth) = &args.truth {
        write_json(truth, &dataset.true_effects)?;
        println!("Wrote true effects to {}", truth.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input;
    use tempfile::TempDir;

    #[test]
    fn test_synth_output_is_readable_input() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("data").join("journeys.json");
        let truth = dir.path().join("truth.json");

        run(SynthArgs {
            output: output.clone(),
            truth: Some(truth.clone()),
            journeys: 25,
            noise: 0.1,
            seed: 5,
        })
        .unwrap();

        let request = input::load_request(&output).unwrap();
        assert_eq!(request.journeys.len(), 25);
        let effects = input::load_channel_map(&truth).unwrap();
        assert_eq!(effects.len(), 5);
    }
}
