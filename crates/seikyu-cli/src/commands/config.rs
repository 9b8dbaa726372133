//! Config command - manage configuration.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use seikyu_core::ExtractorConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the configuration (defaults when no file exists)
    Show {
        /// Configuration file path
        #[arg(short, long, default_value = "seikyu.json")]
        path: PathBuf,
    },

    /// Initialize a new configuration file with defaults
    Init(InitArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long, default_value = "seikyu.json")]
    output: PathBuf,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { path } => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args),
    }
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    let config = if path.exists() {
        ExtractorConfig::from_file(path)?
    } else {
        println!(
            "{} No config file at {}, showing defaults.",
            style("ℹ").blue(),
            path.display()
        );
        ExtractorConfig::default()
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {} (use --force to overwrite)",
            args.output.display()
        );
    }

    ExtractorConfig::default().save(&args.output)?;
    println!(
        "{} Default configuration written to {}",
        style("✓").green(),
        args.output.display()
    );
    Ok(())
}
