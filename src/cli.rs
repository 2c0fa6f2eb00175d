use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load quiz item quality-review exports into a relational table",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean an export and replace the destination table with its rows
    Load(LoadArgs),
    /// Show the schema inferred for an export without touching the database
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// YAML job configuration (layout, normalization rules, database)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Input CSV export, overriding `input` from the config
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Destination table, overriding `table` from the config
    #[arg(short, long)]
    pub table: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub job: JobArgs,
    /// Run every step up to the database and print the statements instead
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub job: JobArgs,
}
