pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod db;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod writer;

use std::{env, fmt::Write as _, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, JobArgs},
    config::JobConfig,
    pipeline::Target,
    schema::{Dialect, SchemaPlan},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("case_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Plan(args) => handle_plan(&args),
    }
}

fn load_job(args: &JobArgs) -> Result<(JobConfig, Target)> {
    let config = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };
    let target = Target::resolve(&config, args.input.as_deref(), args.table.as_deref())?;
    Ok((config, target))
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let (config, target) = load_job(&args.job)?;
    if !args.dry_run {
        pipeline::run(&config, &target)
            .with_context(|| format!("Loading {:?} into `{}`", target.input, target.table))?;
        return Ok(());
    }
    let dataset = pipeline::prepare(&config, &target.input, normalize::batch_timestamp())?;
    let plan = pipeline::plan(&config, &dataset)?;
    let dialect = match &config.database {
        Some(config::DatabaseConfig::Sqlite(_)) => Dialect::Sqlite,
        _ => Dialect::MySql,
    };
    println!("{}", plan.drop_table_sql(&target.table, dialect)?);
    println!("{}", plan.create_table_sql(&target.table, dialect)?);
    println!("{}", plan.insert_sql(&target.table, dialect)?);
    info!(
        "Dry run: {} row(s) ready for `{}`, database untouched",
        dataset.len(),
        target.table
    );
    Ok(())
}

fn handle_plan(args: &cli::PlanArgs) -> Result<()> {
    let (config, target) = load_job(&args.job)?;
    let dataset = pipeline::prepare(&config, &target.input, normalize::batch_timestamp())?;
    let plan = pipeline::plan(&config, &dataset)?;
    print!("{}", render_plan(&plan, &target.table)?);
    info!(
        "Planned {} column(s) for {} row(s) of {:?}",
        plan.columns.len(),
        dataset.len(),
        target.input
    );
    Ok(())
}

/// Column listing followed by the MySQL `CREATE TABLE` statement.
pub fn render_plan(plan: &SchemaPlan, table: &str) -> Result<String> {
    let rows: Vec<[String; 4]> = plan
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            [
                (idx + 1).to_string(),
                column.name.clone(),
                column.source.to_string(),
                Dialect::MySql.render_type(column.sql_type),
            ]
        })
        .collect();
    let header = ["#", "column", "source", "sql"].map(str::to_string);
    let mut widths = header.clone().map(|h| display_width(&h));
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    for row in std::iter::once(&header).chain(&rows) {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| {
                let pad = width.saturating_sub(display_width(cell));
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(output, "{}", line.trim_end());
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "{}", plan.create_table_sql(table, Dialect::MySql)?);
    Ok(output)
}

/// Terminal cells taken by `value`; East Asian wide and fullwidth characters
/// count as two.
fn display_width(value: &str) -> usize {
    value.chars().map(|ch| if is_wide(ch) { 2 } else { 1 }).sum()
}

fn is_wide(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x20000..=0x2FFFD
            | 0x30000..=0x3FFFD
    )
}
