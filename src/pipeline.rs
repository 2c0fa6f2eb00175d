//! One batch run: load → normalize → infer schema → write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use log::info;

use crate::{
    config::{DatabaseConfig, JobConfig},
    dataset::Dataset,
    io_utils,
    loader::{self, CsvOptions},
    normalize,
    schema::SchemaPlan,
    writer::{self, LoadReport},
};

/// Input path and table name after applying command-line overrides.
#[derive(Debug, Clone)]
pub struct Target {
    pub input: PathBuf,
    pub table: String,
}

impl Target {
    pub fn resolve(
        config: &JobConfig,
        input: Option<&Path>,
        table: Option<&str>,
    ) -> Result<Self> {
        let input = input
            .map(Path::to_path_buf)
            .or_else(|| config.input.clone())
            .ok_or_else(|| {
                anyhow!("No input file given; pass --input or set 'input' in the config")
            })?;
        let table = table
            .map(str::to_string)
            .or_else(|| config.table.clone())
            .ok_or_else(|| {
                anyhow!("No destination table given; pass --table or set 'table' in the config")
            })?;
        Ok(Self { input, table })
    }
}

pub fn csv_options(config: &JobConfig, input: &Path) -> Result<CsvOptions> {
    Ok(CsvOptions {
        delimiter: io_utils::resolve_input_delimiter(input, config.delimiter_byte()?),
        encoding: io_utils::resolve_encoding(config.encoding.as_deref())?,
        na_values: config.na_values.clone(),
    })
}

/// Loads and normalizes `input`, stamping every row with `loaded_at`.
pub fn prepare(config: &JobConfig, input: &Path, loaded_at: NaiveDateTime) -> Result<Dataset> {
    let options = csv_options(config, input)?;
    let mut dataset =
        loader::load_cases(input, &options, &config.layout, &config.required_columns())?;
    normalize::normalize(&mut dataset, &config.normalize, loaded_at)
        .with_context(|| format!("Normalizing {input:?}"))?;
    Ok(dataset)
}

pub fn plan(config: &JobConfig, dataset: &Dataset) -> Result<SchemaPlan> {
    SchemaPlan::infer(dataset, config.unknown_types).context("Inferring destination schema")
}

pub fn database(config: &JobConfig) -> Result<&DatabaseConfig> {
    config
        .database
        .as_ref()
        .ok_or_else(|| anyhow!("No 'database' section in the config"))
}

/// Runs the whole job against the configured database.
pub fn run(config: &JobConfig, target: &Target) -> Result<LoadReport> {
    let destination = database(config)?;
    let dataset = prepare(config, &target.input, normalize::batch_timestamp())?;
    let schema = plan(config, &dataset)?;
    let report = writer::load(destination, &dataset, &schema, &target.table)?;
    info!(
        "Loaded {} row(s) and {} column(s) into `{}` at {}",
        report.rows,
        report.columns,
        report.table,
        destination.target()
    );
    Ok(report)
}
