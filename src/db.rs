//! Database sessions behind the [`Session`] trait.
//!
//! A session owns its connection; dropping it closes the connection, so the
//! writer never has to release anything by hand. Transactions are driven with
//! explicit statements so both backends share one begin/commit/rollback shape.

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::{debug, info};
use mysql::prelude::Queryable;

use crate::{
    config::{DatabaseConfig, MySqlConfig, SqliteConfig},
    data::{TIMESTAMP_FORMAT, Value},
    error::{DbError, WriteError},
    schema::Dialect,
};

/// A cell ready to be bound to a statement parameter. `Null` is distinct from
/// empty text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

impl From<Option<&Value>> for SqlValue {
    fn from(value: Option<&Value>) -> Self {
        match value {
            None => SqlValue::Null,
            Some(Value::Text(s)) => SqlValue::Text(s.clone()),
            Some(Value::Integer(i)) => SqlValue::Integer(*i),
            Some(Value::Float(f)) if f.is_nan() => SqlValue::Null,
            Some(Value::Float(f)) => SqlValue::Float(*f),
            Some(Value::Timestamp(ts)) => SqlValue::DateTime(*ts),
        }
    }
}

pub trait Session {
    fn dialect(&self) -> Dialect;

    /// Runs one statement outside any explicit transaction.
    fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    fn begin(&mut self) -> Result<(), DbError>;

    /// Executes `sql`, a single multi-row insert with one placeholder tuple
    /// per row, binding every row's values positionally in row order.
    fn insert_batch(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError>;

    /// Commits the open transaction, if any.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Rolls back the open transaction, if any.
    fn rollback(&mut self) -> Result<(), DbError>;
}

/// Opens a session for `config`. On failure no session exists.
pub fn connect(config: &DatabaseConfig) -> Result<Box<dyn Session>, WriteError> {
    let target = config.target();
    let session: Result<Box<dyn Session>, DbError> = match config {
        DatabaseConfig::Mysql(mysql) => {
            MySqlSession::open(mysql).map(|s| Box::new(s) as Box<dyn Session>)
        }
        DatabaseConfig::Sqlite(sqlite) => {
            SqliteSession::open(sqlite).map(|s| Box::new(s) as Box<dyn Session>)
        }
    };
    let session = session.map_err(|source| WriteError::Connection {
        target: target.clone(),
        source,
    })?;
    info!("Connected to {target}");
    Ok(session)
}

pub struct MySqlSession {
    conn: mysql::Conn,
    in_transaction: bool,
}

impl MySqlSession {
    pub fn open(config: &MySqlConfig) -> Result<Self, DbError> {
        if !config
            .charset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DbError::InvalidSetting(format!(
                "charset '{}'",
                config.charset
            )));
        }
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .init(vec![format!("SET NAMES {}", config.charset)]);
        let conn = mysql::Conn::new(mysql::Opts::from(opts))?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }
}

fn mysql_value(value: &SqlValue) -> mysql::Value {
    match value {
        SqlValue::Null => mysql::Value::NULL,
        SqlValue::Text(s) => mysql::Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Integer(i) => mysql::Value::Int(*i),
        SqlValue::Float(f) => mysql::Value::Double(*f),
        SqlValue::DateTime(ts) => mysql::Value::Date(
            ts.year() as u16,
            ts.month() as u8,
            ts.day() as u8,
            ts.hour() as u8,
            ts.minute() as u8,
            ts.second() as u8,
            ts.nanosecond() / 1_000,
        ),
    }
}

impl Session for MySqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        debug!("mysql: {sql}");
        Ok(self.conn.query_drop(sql)?)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.conn.query_drop("START TRANSACTION")?;
        self.in_transaction = true;
        Ok(())
    }

    fn insert_batch(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError> {
        debug!("mysql: insert of {} row(s)", rows.len());
        let params: Vec<mysql::Value> = rows.iter().flatten().map(mysql_value).collect();
        Ok(self.conn.exec_drop(sql, params)?)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.conn.query_drop("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.conn.query_drop("ROLLBACK")?;
        }
        Ok(())
    }
}

pub struct SqliteSession {
    conn: rusqlite::Connection,
}

impl SqliteSession {
    pub fn open(config: &SqliteConfig) -> Result<Self, DbError> {
        let conn = rusqlite::Connection::open(&config.path)?;
        Ok(Self { conn })
    }
}

fn sqlite_value(value: &SqlValue) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        SqlValue::Null => Sql::Null,
        SqlValue::Text(s) => Sql::Text(s.clone()),
        SqlValue::Integer(i) => Sql::Integer(*i),
        SqlValue::Float(f) => Sql::Real(*f),
        SqlValue::DateTime(ts) => Sql::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

impl Session for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        debug!("sqlite: {sql}");
        Ok(self.conn.execute_batch(sql)?)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        Ok(self.conn.execute_batch("BEGIN")?)
    }

    fn insert_batch(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError> {
        debug!("sqlite: insert of {} row(s)", rows.len());
        let params = rows.iter().flatten().map(sqlite_value);
        self.conn.execute(sql, rusqlite::params_from_iter(params))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}
