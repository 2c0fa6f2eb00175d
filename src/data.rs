use std::fmt;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::schema::ColumnType;

/// Tokens read as a missing cell unless the configuration overrides them.
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Text(_) => ColumnType::Text,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Timestamp(_) => ColumnType::Timestamp,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn default_na_values() -> Vec<String> {
    DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect()
}

pub fn is_na(raw: &str, na_values: &[String]) -> bool {
    raw.is_empty() || na_values.iter().any(|token| token == raw)
}

fn looks_integer(raw: &str) -> bool {
    raw.trim().parse::<i64>().is_ok()
}

fn looks_float(raw: &str) -> bool {
    raw.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

/// Picks the narrowest type every present cell parses as. A column mixing
/// numeric and non-numeric cells is `Unknown`. Timestamps are never inferred
/// from file content.
pub fn infer_column_type(cells: &[Option<String>]) -> ColumnType {
    let present: Vec<&String> = cells.iter().flatten().collect();
    if present.is_empty() {
        return ColumnType::Text;
    }
    let integers = present.iter().filter(|raw| looks_integer(raw)).count();
    let numeric = present.iter().filter(|raw| looks_float(raw)).count();
    if integers == present.len() {
        ColumnType::Integer
    } else if numeric == present.len() {
        ColumnType::Float
    } else if numeric == 0 {
        ColumnType::Text
    } else {
        ColumnType::Unknown
    }
}

pub fn parse_typed_value(raw: &str, ty: &ColumnType) -> Result<Value> {
    let parsed = match ty {
        ColumnType::Integer => {
            let parsed: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{raw}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = raw
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{raw}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Timestamp => {
            let parsed = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
                .with_context(|| format!("Failed to parse '{raw}' as timestamp"))?;
            Value::Timestamp(parsed)
        }
        ColumnType::Text | ColumnType::Unknown => Value::Text(raw.to_string()),
    };
    Ok(parsed)
}

/// Infers a column type from raw cells and converts every present cell to it.
pub fn type_column(cells: Vec<Option<String>>) -> Result<(ColumnType, Vec<Option<Value>>)> {
    let ty = infer_column_type(&cells);
    let values = cells
        .into_iter()
        .map(|cell| cell.map(|raw| parse_typed_value(&raw, &ty)).transpose())
        .collect::<Result<Vec<_>>>()?;
    Ok((ty, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn infer_column_type_prefers_integer_then_float() {
        assert_eq!(
            infer_column_type(&cells(&[Some("1"), None, Some("42")])),
            ColumnType::Integer
        );
        assert_eq!(
            infer_column_type(&cells(&[Some("1"), Some("2.5")])),
            ColumnType::Float
        );
        assert_eq!(
            infer_column_type(&cells(&[Some("初中数学"), Some("高中物理")])),
            ColumnType::Text
        );
    }

    #[test]
    fn infer_column_type_marks_numeric_and_text_mix_unknown() {
        assert_eq!(
            infer_column_type(&cells(&[Some("7"), None, Some("abc")])),
            ColumnType::Unknown
        );
        assert_eq!(
            infer_column_type(&cells(&[Some("2.5"), Some("初中数学")])),
            ColumnType::Unknown
        );
        assert_eq!(
            infer_column_type(&cells(&[Some("inf"), Some("1")])),
            ColumnType::Unknown
        );
        assert_eq!(infer_column_type(&cells(&[None, None])), ColumnType::Text);
    }

    #[test]
    fn type_column_keeps_mixed_cells_as_text() {
        let (ty, values) = type_column(cells(&[Some("7"), Some("abc")])).unwrap();
        assert_eq!(ty, ColumnType::Unknown);
        assert_eq!(
            values,
            vec![Some(Value::Text("7".into())), Some(Value::Text("abc".into()))]
        );
    }

    #[test]
    fn is_na_matches_configured_tokens_exactly() {
        let tokens = default_na_values();
        assert!(is_na("", &tokens));
        assert!(is_na("NaN", &tokens));
        assert!(is_na("N/A", &tokens));
        assert!(!is_na("nA", &tokens));
        assert!(!is_na(" ", &tokens));
    }

    #[test]
    fn type_column_converts_present_cells() {
        let (ty, values) = type_column(cells(&[Some("7"), None, Some(" 9")])).unwrap();
        assert_eq!(ty, ColumnType::Integer);
        assert_eq!(
            values,
            vec![Some(Value::Integer(7)), None, Some(Value::Integer(9))]
        );
    }

    #[test]
    fn timestamp_display_uses_second_precision() {
        let ts = NaiveDateTime::parse_from_str("2023-03-16 08:30:05", TIMESTAMP_FORMAT).unwrap();
        assert_eq!(Value::Timestamp(ts).as_display(), "2023-03-16 08:30:05");
        assert_eq!(
            parse_typed_value("2023-03-16 08:30:05", &ColumnType::Timestamp).unwrap(),
            Value::Timestamp(ts)
        );
    }
}
