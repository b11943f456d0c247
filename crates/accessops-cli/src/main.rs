mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;

use accessops_config::Settings;
use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format;

    match &cli.command {
        Commands::Apply(args) => {
            let settings = load_settings(&cli)?;
            commands::apply::apply(&settings, &args.dir, args.dry_run, format).await?;
        }
        Commands::Plan(args) => {
            let settings = load_settings(&cli)?;
            commands::apply::apply(&settings, &args.dir, true, format).await?;
        }
        Commands::Validate(args) => {
            observability::init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            commands::validate::validate(&args.path, format)?;
        }
        Commands::RemovePackage(args) => {
            observability::init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            commands::package::remove(args)?;
        }
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                let settings = load_settings(&cli)?;
                commands::config::show(&settings, format)?;
            }
        },
    }

    Ok(())
}

/// Settings file and environment, with `--log-level` taking precedence over `logging.level`
fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings =
        accessops_config::load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    observability::init_logging(level);
    Ok(settings)
}
