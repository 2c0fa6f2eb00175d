//! Reads the raw export into a [`Dataset`] and applies structural cleanup:
//! anonymous-column renames, column pruning, identifier null filtering,
//! first-occurrence deduplication and integer coercion of the identifier.
//!
//! Header names follow the spreadsheet convention for exports: an empty
//! header at position `i` becomes `Unnamed: i` and repeated names get `.1`,
//! `.2`, ... suffixes. The header is validated before any data row is read.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    config::InputLayout,
    data::{self, Value},
    dataset::{Column, Dataset},
    error::MalformedInput,
    io_utils,
    schema::ColumnType,
};

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub na_values: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
            na_values: data::default_na_values(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_read: usize,
    pub missing_identifier: usize,
    pub duplicates: usize,
}

impl CleanStats {
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.missing_identifier - self.duplicates
    }
}

pub fn mangle_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut suffixes: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name
        };
        let mut candidate = base.clone();
        while seen.contains(&candidate) {
            let suffix = suffixes.entry(base.clone()).or_insert(0);
            *suffix += 1;
            candidate = format!("{base}.{suffix}");
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

/// Checks rename sources and drop targets against the raw header, and the
/// `required` names against the header as it reads after renaming.
pub fn validate_header(
    headers: &[String],
    layout: &InputLayout,
    required: &[&str],
) -> Result<(), MalformedInput> {
    let mut missing: Vec<String> = Vec::new();
    let mut note_missing = |name: &str| {
        if !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    };
    let structural = layout
        .renames
        .iter()
        .map(|r| r.from.as_str())
        .chain(layout.drop_columns.iter().map(String::as_str));
    for name in structural {
        if !headers.iter().any(|h| h == name) {
            note_missing(name);
        }
    }
    let renamed: Vec<&str> = headers
        .iter()
        .map(|h| {
            layout
                .renames
                .iter()
                .find(|r| &r.from == h)
                .map_or(h.as_str(), |r| r.to.as_str())
        })
        .collect();
    for name in required {
        if !renamed.contains(name) {
            note_missing(name);
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MalformedInput::MissingColumns(missing))
    }
}

/// Reads every row of `path` into typed columns.
pub fn read_dataset(
    path: &Path,
    options: &CsvOptions,
    layout: &InputLayout,
    required: &[&str],
) -> Result<Dataset> {
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter)?;
    let header_record = reader
        .byte_headers()
        .with_context(|| format!("Reading header of {path:?}"))?
        .clone();
    let headers = mangle_headers(io_utils::decode_headers(&header_record, options.encoding)?);
    debug!("Header of {:?}: {:?}", path, headers);
    validate_header(&headers, layout, required)?;

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading {path:?}"))?
    {
        let line = record.position().map_or(0, |p| p.line());
        if record.len() > headers.len() {
            return Err(MalformedInput::RaggedRow {
                line,
                expected: headers.len(),
                found: record.len(),
            }
            .into());
        }
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding line {line} of {path:?}"))?;
        let mut fields = decoded.into_iter();
        for column in cells.iter_mut() {
            let cell = fields
                .next()
                .filter(|raw| !data::is_na(raw, &options.na_values));
            column.push(cell);
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| {
            let (dtype, values) =
                data::type_column(raw).with_context(|| format!("Typing column '{name}'"))?;
            Ok(Column::new(name, dtype, values))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Dataset::from_columns(columns)?)
}

/// Renames, prunes, filters and deduplicates a freshly read dataset.
pub fn clean(dataset: &mut Dataset, layout: &InputLayout) -> Result<CleanStats, MalformedInput> {
    let rows_read = dataset.len();
    dataset.rename_columns(&layout.rename_pairs())?;
    dataset.drop_columns(&layout.drop_columns)?;
    let missing_identifier = dataset.drop_missing(&layout.identifier)?;
    let duplicates = dataset.dedup_by(&layout.identifier)?;
    coerce_identifier(dataset, &layout.identifier)?;
    Ok(CleanStats {
        rows_read,
        missing_identifier,
        duplicates,
    })
}

fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Some(*f as i64)
        }
        Value::Text(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Converts the identifier column to 64-bit integers.
pub fn coerce_identifier(dataset: &mut Dataset, name: &str) -> Result<(), MalformedInput> {
    let column = dataset.require_column(name)?;
    if column.dtype() == ColumnType::Integer {
        return Ok(());
    }
    let values = column
        .values()
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(value) => integral(value)
                .map(|id| Some(Value::Integer(id)))
                .ok_or_else(|| MalformedInput::InvalidIdentifier {
                    row: row + 1,
                    value: value.as_display(),
                }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(column) = dataset.column_mut(name) {
        column.replace_values(ColumnType::Integer, values);
    }
    Ok(())
}

/// Reads and cleans the export at `path`. `required` lists the columns later
/// stages read; they are checked with the header before rows are loaded.
pub fn load_cases(
    path: &Path,
    options: &CsvOptions,
    layout: &InputLayout,
    required: &[&str],
) -> Result<Dataset> {
    let mut dataset = read_dataset(path, options, layout, required)?;
    let stats = clean(&mut dataset, layout)
        .with_context(|| format!("Cleaning rows of {path:?}"))?;
    info!(
        "Loaded {} row(s) from {:?}: {} without '{}', {} duplicate(s), {} kept",
        stats.rows_read,
        path,
        stats.missing_identifier,
        layout.identifier,
        stats.duplicates,
        stats.rows_kept()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnRename;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn layout() -> InputLayout {
        InputLayout {
            identifier: "id".to_string(),
            renames: vec![ColumnRename {
                from: "Unnamed: 2".to_string(),
                to: "grade".to_string(),
            }],
            drop_columns: vec!["url".to_string(), "shot.1".to_string()],
        }
    }

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file
    }

    #[test]
    fn mangle_headers_names_anonymous_and_repeated_columns() {
        let headers = mangle_headers(
            ["截图", "", "截图", "", "截图"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(headers, vec!["截图", "Unnamed: 1", "截图.1", "Unnamed: 3", "截图.2"]);
    }

    #[test]
    fn load_cases_cleans_rows_and_columns() {
        let file = write_csv(
            "id,url,,shot,shot,note\n\
             7,http://a,初一,x,y,first\n\
             ,http://b,初二,x,y,orphan\n\
             7,http://c,初三,x,y,second\n\
             8.0,http://d,,x,y,NA\n",
        );
        let dataset =
            load_cases(file.path(), &CsvOptions::default(), &layout(), &["grade"]).unwrap();
        assert_eq!(dataset.headers(), vec!["id", "grade", "shot", "note"]);
        assert_eq!(dataset.len(), 2);
        let ids = dataset.column("id").unwrap();
        assert_eq!(ids.dtype(), ColumnType::Integer);
        assert_eq!(
            ids.values(),
            &[Some(Value::Integer(7)), Some(Value::Integer(8))][..]
        );
        let notes = dataset.column("note").unwrap();
        assert_eq!(notes.values(), &[Some(Value::Text("first".into())), None][..]);
    }

    #[test]
    fn load_cases_validates_header_before_reading_rows() {
        let file = write_csv("id,note\n1,a\n");
        let err = load_cases(file.path(), &CsvOptions::default(), &layout(), &["grade"])
            .unwrap_err();
        let malformed = err.downcast_ref::<MalformedInput>().expect("malformed input");
        match malformed {
            MalformedInput::MissingColumns(names) => {
                assert_eq!(names, &["Unnamed: 2", "url", "shot.1", "grade"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn load_cases_rejects_rows_longer_than_header() {
        let file = write_csv("id,url,,shot,shot\n1,u,g,s,s,extra\n");
        let err = load_cases(file.path(), &CsvOptions::default(), &layout(), &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MalformedInput>(),
            Some(MalformedInput::RaggedRow {
                expected: 5,
                found: 6,
                ..
            })
        ));
    }

    #[test]
    fn short_rows_are_padded_with_missing_cells() {
        let file = write_csv("id,url,,shot,shot,note\n1,u\n");
        let dataset = load_cases(file.path(), &CsvOptions::default(), &layout(), &[]).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.column("note").unwrap().get(0), None);
    }

    #[test]
    fn coerce_identifier_rejects_fractional_and_text_ids() {
        let mut dataset = Dataset::from_columns(vec![Column::new(
            "id",
            ColumnType::Float,
            vec![Some(Value::Float(3.0)), Some(Value::Float(3.5))],
        )])
        .unwrap();
        let err = coerce_identifier(&mut dataset, "id").unwrap_err();
        assert!(matches!(err, MalformedInput::InvalidIdentifier { row: 2, .. }));

        let mut dataset = Dataset::from_columns(vec![Column::new(
            "id",
            ColumnType::Text,
            vec![Some(Value::Text(" 12".into()))],
        )])
        .unwrap();
        coerce_identifier(&mut dataset, "id").unwrap();
        assert_eq!(dataset.column("id").unwrap().get(0), Some(&Value::Integer(12)));
    }
}
