use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod input;
mod output;

#[derive(Parser)]
#[command(name = "touchline", about = "Multi-touch marketing attribution")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Attribute conversions across channels
    Analyze(commands::analyze::AnalyzeArgs),
    /// Compare model credit with rule-based baselines
    Baselines(commands::baselines::BaselinesArgs),
    /// Validate model credit against known channel effects
    Compare(commands::compare::CompareArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate synthetic journeys with known effects
    Synth(commands::synth::SynthArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze(args) => commands::analyze::run(args).await,
        Commands::Baselines(args) => commands::baselines::run(args),
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Synth(args) => commands::synth::run(args),
    }
}
