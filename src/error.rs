//! Error types shared by the pipeline stages.
//!
//! Input defects surface as [`MalformedInput`], schema rendering problems as
//! [`SchemaError`], and everything that touches the destination database as
//! [`WriteError`], which wraps the driver-level [`DbError`].

use thiserror::Error;

use crate::schema::ColumnType;

/// The input file does not have the shape the job expects.
#[derive(Debug, Error)]
pub enum MalformedInput {
    #[error("input is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("line {line}: row has {found} field(s) but the header has {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: identifier '{value}' is not an integer")]
    InvalidIdentifier { row: usize, value: String },

    #[error("column '{column}' must hold text values, found {found}")]
    NonTextColumn { column: String, found: ColumnType },

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("column '{column}' has {found} value(s), expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("column '{0}' has no supported SQL type")]
    UnsupportedType(String),

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("dataset has no columns to load")]
    NoColumns,
}

/// Driver-level failure from one of the supported database backends.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("mysql: {0}")]
    MySql(#[from] mysql::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid connection setting: {0}")]
    InvalidSetting(String),
}

/// Failures of the load step, split by the phase that failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: DbError,
    },

    #[error("schema change on table `{table}` failed: {source}")]
    Schema {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("insert of {rows} row(s) into `{table}` failed and was rolled back: {source}")]
    Insert {
        table: String,
        rows: usize,
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    Plan(#[from] SchemaError),
}
