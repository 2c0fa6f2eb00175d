//! Destination schema inference and SQL statement rendering.
//!
//! A [`SchemaPlan`] is derived from the declared [`ColumnType`] of every
//! dataset column. Inference is purely syntactic: a text column holding only
//! digit strings is still a `VARCHAR(255)`. The plan keeps dataset column
//! order, so the generated type list, field list and insert placeholders all
//! index identically.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{dataset::Dataset, error::SchemaError};

pub const VARCHAR_LENGTH: u16 = 255;
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Runtime type of an in-memory column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Timestamp,
    /// Mixed or otherwise unrecognized content.
    Unknown,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    VarChar(u16),
    Int,
    Float,
    DateTime,
}

/// What to do with a column whose type has no direct SQL mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTypePolicy {
    #[default]
    Varchar,
    Reject,
}

impl SqlType {
    pub fn for_column(
        name: &str,
        ty: ColumnType,
        policy: UnknownTypePolicy,
    ) -> Result<Self, SchemaError> {
        match ty {
            ColumnType::Text => Ok(SqlType::VarChar(VARCHAR_LENGTH)),
            ColumnType::Integer => Ok(SqlType::Int),
            ColumnType::Float => Ok(SqlType::Float),
            ColumnType::Timestamp => Ok(SqlType::DateTime),
            ColumnType::Unknown => match policy {
                UnknownTypePolicy::Varchar => Ok(SqlType::VarChar(VARCHAR_LENGTH)),
                UnknownTypePolicy::Reject => Err(SchemaError::UnsupportedType(name.to_string())),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    /// STRICT tables, so values that do not fit the declared type are rejected.
    Sqlite,
}

impl Dialect {
    pub fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    pub fn render_type(&self, ty: SqlType) -> String {
        match (self, ty) {
            (Dialect::MySql, SqlType::VarChar(len)) => format!("VARCHAR({len})"),
            (Dialect::MySql, SqlType::Int) => "INT".to_string(),
            (Dialect::MySql, SqlType::Float) => "FLOAT".to_string(),
            (Dialect::MySql, SqlType::DateTime) => "DATETIME".to_string(),
            (Dialect::Sqlite, SqlType::VarChar(_) | SqlType::DateTime) => "TEXT".to_string(),
            (Dialect::Sqlite, SqlType::Int) => "INTEGER".to_string(),
            (Dialect::Sqlite, SqlType::Float) => "REAL".to_string(),
        }
    }

    fn primary_key(&self) -> String {
        let id = self.quote_ident(PRIMARY_KEY_COLUMN);
        match self {
            Dialect::MySql => format!("{id} INT PRIMARY KEY NOT NULL AUTO_INCREMENT"),
            Dialect::Sqlite => format!("{id} INTEGER PRIMARY KEY AUTOINCREMENT"),
        }
    }

    /// Placeholder limit of a single prepared statement.
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::MySql => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }

    fn table_options(&self) -> &'static str {
        match self {
            Dialect::MySql => "",
            Dialect::Sqlite => " STRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    pub name: String,
    pub source: ColumnType,
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub columns: Vec<PlannedColumn>,
}

impl SchemaPlan {
    pub fn infer(dataset: &Dataset, policy: UnknownTypePolicy) -> Result<Self, SchemaError> {
        if dataset.width() == 0 {
            return Err(SchemaError::NoColumns);
        }
        let columns = dataset
            .columns()
            .iter()
            .map(|column| -> Result<PlannedColumn, SchemaError> {
                Ok(PlannedColumn {
                    name: column.name().to_string(),
                    source: column.dtype(),
                    sql_type: SqlType::for_column(column.name(), column.dtype(), policy)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SchemaPlan { columns })
    }

    /// Comma-joined `quoted-name TYPE` pairs.
    pub fn type_list(&self, dialect: Dialect) -> String {
        self.columns
            .iter()
            .map(|c| {
                format!(
                    "{} {}",
                    dialect.quote_ident(&c.name),
                    dialect.render_type(c.sql_type)
                )
            })
            .join(",")
    }

    /// Comma-joined quoted column names.
    pub fn field_list(&self, dialect: Dialect) -> String {
        self.columns
            .iter()
            .map(|c| dialect.quote_ident(&c.name))
            .join(",")
    }

    pub fn drop_table_sql(&self, table: &str, dialect: Dialect) -> Result<String, SchemaError> {
        validate_table_name(table)?;
        Ok(format!("DROP TABLE IF EXISTS {};", dialect.quote_ident(table)))
    }

    pub fn create_table_sql(&self, table: &str, dialect: Dialect) -> Result<String, SchemaError> {
        validate_table_name(table)?;
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {}({},{}){};",
            dialect.quote_ident(table),
            dialect.primary_key(),
            self.type_list(dialect),
            dialect.table_options()
        ))
    }

    pub fn insert_sql(&self, table: &str, dialect: Dialect) -> Result<String, SchemaError> {
        self.insert_rows_sql(table, dialect, 1)
    }

    /// One `INSERT` carrying `rows` placeholder tuples.
    pub fn insert_rows_sql(
        &self,
        table: &str,
        dialect: Dialect,
        rows: usize,
    ) -> Result<String, SchemaError> {
        validate_table_name(table)?;
        let tuple = format!(
            "({})",
            std::iter::repeat_n("?", self.columns.len()).join(",")
        );
        Ok(format!(
            "INSERT INTO {}({}) VALUES{}",
            dialect.quote_ident(table),
            self.field_list(dialect),
            std::iter::repeat_n(tuple.as_str(), rows.max(1)).join(",")
        ))
    }

    /// Most rows one insert statement can bind in `dialect`.
    pub fn rows_per_statement(&self, dialect: Dialect) -> usize {
        (dialect.max_bind_params() / self.columns.len().max(1)).max(1)
    }
}

pub fn validate_table_name(table: &str) -> Result<(), SchemaError> {
    if table.trim().is_empty() || table.contains('\0') {
        return Err(SchemaError::InvalidTableName(table.to_string()));
    }
    Ok(())
}
