use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "accessops")]
#[command(about = "Apply Azure DevOps service connections and Azure access from YAML definitions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ./accessops.toml when present)
    #[arg(short, long, global = true, env = "ACCESSOPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (overrides logging.level from settings)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update service connections and grant their access
    Apply(ApplyArgs),
    /// Show what apply would change without writing anything
    Plan(DirArgs),
    /// Check definition files without contacting Azure
    Validate(ValidateArgs),
    /// Remove a PackageReference from an MSBuild project file
    RemovePackage(RemovePackageArgs),
    /// Inspect settings
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct DirArgs {
    /// Directory containing *.yml / *.yaml definition files
    pub dir: PathBuf,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Definition directory, or a single definition file
    pub path: PathBuf,
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Directory containing *.yml / *.yaml definition files
    pub dir: PathBuf,
    /// Report intended changes without applying them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct RemovePackageArgs {
    /// Project file (.csproj, .fsproj, .props)
    pub project: PathBuf,
    /// Package id to remove
    pub package: String,
    /// Write the result here instead of editing the project in place
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Fail when the project does not reference the package
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective settings with secrets masked
    Show,
}
