//! Job configuration loaded from YAML.
//!
//! Every section except `database` has defaults that reproduce the layout of
//! the quality-review spreadsheet export, so a minimal file only names the
//! destination:
//!
//! ```yaml
//! input: data/cases.csv
//! table: case_quality
//! database:
//!   driver: mysql
//!   host: 127.0.0.1
//!   port: 3306
//!   user: loader
//!   password: secret
//!   database: case_data
//! ```

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use crate::{data::default_na_values, io_utils, schema::UnknownTypePolicy};

pub const DEFAULT_CHARSET: &str = "utf8";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default = "default_na_values")]
    pub na_values: Vec<String>,
    #[serde(default)]
    pub unknown_types: UnknownTypePolicy,
    #[serde(default)]
    pub layout: InputLayout,
    #[serde(default)]
    pub normalize: NormalizeSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input: None,
            table: None,
            delimiter: None,
            encoding: None,
            na_values: default_na_values(),
            unknown_types: UnknownTypePolicy::default(),
            layout: InputLayout::default(),
            normalize: NormalizeSettings::default(),
            database: None,
        }
    }
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: JobConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config file {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.layout.identifier.trim().is_empty(),
            "layout.identifier must name a column"
        );
        ensure!(
            self.normalize.period_subject.width > 0,
            "normalize.period_subject.width must be positive"
        );
        if let Some(delimiter) = &self.delimiter {
            io_utils::parse_delimiter(delimiter).map_err(|e| anyhow!(e))?;
        }
        if let Some(DatabaseConfig::Mysql(mysql)) = &self.database {
            mysql.validate()?;
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        self.delimiter
            .as_deref()
            .map(|d| io_utils::parse_delimiter(d).map_err(|e| anyhow!(e)))
            .transpose()
    }

    /// Columns the normalizer reads, checked against the header after renames.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut required = vec![self.layout.identifier.as_str()];
        required.extend(self.normalize.source_columns());
        required
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
}

impl ColumnRename {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Structural cleanup of the raw export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLayout {
    pub identifier: String,
    pub renames: Vec<ColumnRename>,
    pub drop_columns: Vec<String>,
}

impl Default for InputLayout {
    fn default() -> Self {
        let mut drop_columns: Vec<String> = ["书本id", "题目url", "原题", "截图", "Unnamed: 18", "截图.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        drop_columns.extend((25..=34).map(|idx| format!("Unnamed: {idx}")));
        drop_columns.push("0".to_string());
        Self {
            identifier: "题目id".to_string(),
            renames: vec![
                ColumnRename::new("Unnamed: 5", "年级"),
                ColumnRename::new("Unnamed: 6", "题型"),
                ColumnRename::new("Unnamed: 7", "学段学科"),
                ColumnRename::new("Unnamed: 8", "是否有图表"),
                ColumnRename::new("Unnamed: 9", "是否有公式"),
            ],
            drop_columns,
        }
    }
}

impl InputLayout {
    pub fn rename_pairs(&self) -> Vec<(String, String)> {
        self.renames
            .iter()
            .map(|r| (r.from.clone(), r.to.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub token: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySettings {
    pub column: String,
    /// Applied in order; a later matching rule overwrites an earlier one.
    pub rules: Vec<CategoryRule>,
}

impl Default for CategorySettings {
    fn default() -> Self {
        let rule = |token: &str, label: &str| CategoryRule {
            token: token.to_string(),
            label: label.to_string(),
        };
        Self {
            column: "问题分类".to_string(),
            rules: vec![
                rule("产研", "产研问题"),
                rule("学科", "学科问题"),
                rule("编排", "编排问题"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodSubjectSplit {
    pub source: String,
    pub period: String,
    pub subject: String,
    pub width: usize,
}

impl Default for PeriodSubjectSplit {
    fn default() -> Self {
        Self {
            source: "学段学科".to_string(),
            period: "学段".to_string(),
            subject: "学科".to_string(),
            width: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRule {
    pub column: String,
    pub marker: String,
    pub present: String,
    pub absent: String,
}

impl FlagRule {
    fn new(column: &str, marker: &str, present: &str, absent: &str) -> Self {
        Self {
            column: column.to_string(),
            marker: marker.to_string(),
            present: present.to_string(),
            absent: absent.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartTableSplit {
    pub source: String,
    pub chart: FlagRule,
    pub table: FlagRule,
}

impl Default for ChartTableSplit {
    fn default() -> Self {
        Self {
            source: "是否有图表".to_string(),
            chart: FlagRule::new("是否有图", "有图", "有图", "无图"),
            table: FlagRule::new("是否有表", "有表格", "有表", "无表"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    pub category: CategorySettings,
    pub period_subject: PeriodSubjectSplit,
    pub chart_table: ChartTableSplit,
    pub loaded_at: String,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            category: CategorySettings::default(),
            period_subject: PeriodSubjectSplit::default(),
            chart_table: ChartTableSplit::default(),
            loaded_at: "更新时间".to_string(),
        }
    }
}

impl NormalizeSettings {
    pub fn source_columns(&self) -> [&str; 3] {
        [
            self.category.column.as_str(),
            self.period_subject.source.as_str(),
            self.chart_table.source.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Mysql(MySqlConfig),
    Sqlite(SqliteConfig),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

impl MySqlConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.host.trim().is_empty(), "database.host must not be empty");
        ensure!(!self.user.trim().is_empty(), "database.user must not be empty");
        ensure!(
            !self.database.trim().is_empty(),
            "database.database must not be empty"
        );
        ensure!(
            !self.charset.is_empty()
                && self
                    .charset
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "database.charset '{}' must be alphanumeric",
            self.charset
        );
        Ok(())
    }

    pub fn target(&self) -> String {
        format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl DatabaseConfig {
    pub fn target(&self) -> String {
        match self {
            DatabaseConfig::Mysql(mysql) => mysql.target(),
            DatabaseConfig::Sqlite(sqlite) => format!("sqlite://{}", sqlite.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_mysql_config_gets_export_defaults() {
        let yaml = r#"
table: 题目质量0316
database:
  driver: mysql
  host: 192.168.190.106
  port: 3306
  user: root
  password: hunter2
  database: case_data
"#;
        let config: JobConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.layout.identifier, "题目id");
        assert_eq!(config.layout.renames.len(), 5);
        assert_eq!(config.layout.drop_columns.len(), 17);
        assert!(config.layout.drop_columns.contains(&"Unnamed: 34".to_string()));
        assert_eq!(config.normalize.category.rules[2].label, "编排问题");
        assert_eq!(config.unknown_types, UnknownTypePolicy::Varchar);
        match config.database {
            Some(DatabaseConfig::Mysql(mysql)) => {
                assert_eq!(mysql.charset, "utf8");
                assert!(!format!("{mysql:?}").contains("hunter2"));
            }
            other => panic!("expected mysql config, got {other:?}"),
        }
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
unknown_types: reject
normalize:
  period_subject:
    width: 3
database:
  driver: sqlite
  path: cases.db
"#;
        let config: JobConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.normalize.period_subject.width, 3);
        assert_eq!(config.normalize.period_subject.source, "学段学科");
        assert_eq!(config.unknown_types, UnknownTypePolicy::Reject);
        assert!(matches!(config.database, Some(DatabaseConfig::Sqlite(_))));
    }

    #[test]
    fn validate_rejects_injected_charset_and_bad_delimiter() {
        let mut config = JobConfig {
            database: Some(DatabaseConfig::Mysql(MySqlConfig {
                host: "localhost".into(),
                port: 3306,
                user: "root".into(),
                password: String::new(),
                database: "case_data".into(),
                charset: "utf8; DROP".into(),
            })),
            ..JobConfig::default()
        };
        assert!(config.validate().is_err());

        config.database = None;
        config.delimiter = Some("::".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn required_columns_cover_identifier_and_normalizer_sources() {
        let config = JobConfig::default();
        assert_eq!(
            config.required_columns(),
            vec!["题目id", "问题分类", "学段学科", "是否有图表"]
        );
    }
}
