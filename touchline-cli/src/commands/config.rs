use crate::config::ConfigLoader;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the merged engine configuration as TOML
    Show,
    /// Show configuration file paths and which of them exist
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn describe(path: &Path) -> String {
    let state = if path.exists() { "found" } else { "not found" };
    format!("{} ({})", path.display(), state)
}

fn show_paths() -> Result<()> {
    match ConfigLoader::user_config_path() {
        Some(path) => println!("User config:    {}", describe(&path)),
        None => println!("User config:    <no home directory>"),
    }
    println!(
        "Project config: {}",
        describe(&ConfigLoader::project_config_path())
    );
    Ok(())
}
