//! Replaces the destination table and bulk-inserts a dataset.
//!
//! The drop and the create each commit on their own. Rows go out as
//! multi-row `INSERT` statements (one per chunk when the batch exceeds the
//! dialect's placeholder limit) inside one transaction: any failing row rolls
//! back the whole batch while the freshly created (empty) table stays in
//! place.

use log::{error, info, warn};

use crate::{
    config::DatabaseConfig,
    dataset::Dataset,
    db::{self, Session, SqlValue},
    error::{DbError, WriteError},
    schema::{Dialect, SchemaPlan, SqlType},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub columns: usize,
    pub rows: usize,
}

/// Converts every row to bindable values in dataset order.
pub fn to_sql_rows(dataset: &Dataset) -> Vec<Vec<SqlValue>> {
    dataset
        .rows()
        .map(|row| row.into_iter().map(SqlValue::from).collect())
        .collect()
}

fn run_schema_statement(
    session: &mut dyn Session,
    table: &str,
    sql: &str,
) -> Result<(), WriteError> {
    let result = session.execute(sql).and_then(|_| session.commit());
    if let Err(source) = result {
        if let Err(rollback) = session.rollback() {
            warn!("Rollback after failed schema change on `{table}` also failed: {rollback}");
        }
        return Err(WriteError::Schema {
            table: table.to_string(),
            source,
        });
    }
    Ok(())
}

/// Splits `rows` into multi-row insert statements sized for the dialect.
fn insert_statements<'a>(
    plan: &SchemaPlan,
    table: &str,
    dialect: Dialect,
    rows: &'a [Vec<SqlValue>],
) -> Result<Vec<(String, &'a [Vec<SqlValue>])>, WriteError> {
    rows.chunks(plan.rows_per_statement(dialect))
        .map(|chunk| -> Result<_, WriteError> {
            Ok((plan.insert_rows_sql(table, dialect, chunk.len())?, chunk))
        })
        .collect()
}

fn insert_all(
    session: &mut dyn Session,
    statements: &[(String, &[Vec<SqlValue>])],
) -> Result<(), DbError> {
    session.begin()?;
    for (sql, rows) in statements {
        session.insert_batch(sql, rows)?;
    }
    session.commit()
}

fn warn_overlong_text(dataset: &Dataset, plan: &SchemaPlan) {
    for (column, planned) in dataset.columns().iter().zip(&plan.columns) {
        let SqlType::VarChar(limit) = planned.sql_type else {
            continue;
        };
        let overlong = column
            .values()
            .iter()
            .flatten()
            .filter_map(|value| value.as_text())
            .filter(|text| text.chars().count() > usize::from(limit))
            .count();
        if overlong > 0 {
            warn!(
                "Column '{}' has {} value(s) longer than {} characters",
                column.name(),
                overlong,
                limit
            );
        }
    }
}

/// Drops and recreates `table` from `plan`, then inserts every row of `dataset`.
pub fn write_dataset(
    session: &mut dyn Session,
    dataset: &Dataset,
    plan: &SchemaPlan,
    table: &str,
) -> Result<LoadReport, WriteError> {
    let dialect = session.dialect();
    let drop_sql = plan.drop_table_sql(table, dialect)?;
    let create_sql = plan.create_table_sql(table, dialect)?;

    run_schema_statement(session, table, &drop_sql)?;
    info!("Creating table `{table}`");
    run_schema_statement(session, table, &create_sql)?;
    info!("Table `{table}` created with {} column(s)", plan.columns.len());

    warn_overlong_text(dataset, plan);
    let rows = to_sql_rows(dataset);
    let statements = insert_statements(plan, table, dialect, &rows)?;
    info!(
        "Writing {} row(s) into `{table}` with {} statement(s)",
        rows.len(),
        statements.len()
    );
    if let Err(source) = insert_all(session, &statements) {
        error!("Writing into `{table}` failed, rolling back: {source}");
        if let Err(rollback) = session.rollback() {
            warn!("Rollback of `{table}` insert failed: {rollback}");
        }
        return Err(WriteError::Insert {
            table: table.to_string(),
            rows: rows.len(),
            source,
        });
    }
    info!("Finished writing `{table}`");
    Ok(LoadReport {
        table: table.to_string(),
        columns: plan.columns.len(),
        rows: rows.len(),
    })
}

/// Connects with `config` and writes the dataset. The session is released
/// when this returns, successful or not.
pub fn load(
    config: &DatabaseConfig,
    dataset: &Dataset,
    plan: &SchemaPlan,
    table: &str,
) -> Result<LoadReport, WriteError> {
    let mut session = db::connect(config)?;
    write_dataset(session.as_mut(), dataset, plan, table)
}
