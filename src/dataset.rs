//! In-memory column store that the pipeline stages mutate in place.
//!
//! A [`Dataset`] is an ordered list of equally long [`Column`]s. Every
//! column carries a declared [`ColumnType`]; cells are `Option<Value>` where
//! `None` is a missing value.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::{data::Value, error::MalformedInput, schema::ColumnType};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: ColumnType,
    values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Builds a column whose type is that of its present values, `Unknown`
    /// when they disagree and `Text` when there are none.
    pub fn from_values(name: impl Into<String>, values: Vec<Option<Value>>) -> Self {
        let mut types = values.iter().flatten().map(Value::column_type);
        let dtype = match types.next() {
            None => ColumnType::Text,
            Some(first) => {
                if types.all(|ty| ty == first) {
                    first
                } else {
                    ColumnType::Unknown
                }
            }
        };
        Self::new(name, dtype, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> ColumnType {
        self.dtype
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn replace_values(&mut self, dtype: ColumnType, values: Vec<Option<Value>>) {
        self.dtype = dtype;
        self.values = values;
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Option<Value>] {
        &mut self.values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, MalformedInput> {
        let mut dataset = Dataset::new();
        for column in columns {
            if dataset.position(column.name()).is_some() {
                return Err(MalformedInput::DuplicateColumn(column.name.clone()));
            }
            dataset.set_column(column)?;
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns every name in `names` that is not a column of this dataset.
    pub fn missing_columns<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing = Vec::new();
        for name in names {
            if self.position(name).is_none() && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        missing
    }

    pub fn require<'a, I>(&self, names: I) -> Result<(), MalformedInput>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing = self.missing_columns(names);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MalformedInput::MissingColumns(missing))
        }
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, MalformedInput> {
        self.column(name)
            .ok_or_else(|| MalformedInput::MissingColumns(vec![name.to_string()]))
    }

    /// Applies renames in order. All sources must exist before anything is renamed.
    pub fn rename_columns(&mut self, renames: &[(String, String)]) -> Result<(), MalformedInput> {
        self.require(renames.iter().map(|(from, _)| from.as_str()))?;
        for (from, to) in renames {
            if from == to {
                continue;
            }
            if self.position(to).is_some() {
                return Err(MalformedInput::DuplicateColumn(to.clone()));
            }
            if let Some(column) = self.column_mut(from) {
                column.name = to.clone();
            }
        }
        Ok(())
    }

    pub fn drop_columns(&mut self, names: &[String]) -> Result<(), MalformedInput> {
        self.require(names.iter().map(String::as_str))?;
        self.columns.retain(|c| !names.contains(&c.name));
        Ok(())
    }

    /// Inserts a column, replacing an existing one of the same name in place.
    pub fn set_column(&mut self, column: Column) -> Result<(), MalformedInput> {
        if !self.columns.is_empty() && column.len() != self.rows {
            return Err(MalformedInput::LengthMismatch {
                column: column.name.clone(),
                expected: self.rows,
                found: column.len(),
            });
        }
        self.rows = column.len();
        match self.position(column.name()) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Keeps the rows whose mask entry is `true`.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.rows);
        for column in &mut self.columns {
            let mut idx = 0;
            column.values.retain(|_| {
                let kept = keep.get(idx).copied().unwrap_or(false);
                idx += 1;
                kept
            });
        }
        self.rows = keep.iter().filter(|k| **k).count();
    }

    /// Drops rows where `column` is missing, returning how many were removed.
    pub fn drop_missing(&mut self, column: &str) -> Result<usize, MalformedInput> {
        let keep: Vec<bool> = self
            .require_column(column)?
            .values
            .iter()
            .map(Option::is_some)
            .collect();
        let before = self.rows;
        self.retain_rows(&keep);
        Ok(before - self.rows)
    }

    /// Removes later rows repeating an earlier value of `column`.
    pub fn dedup_by(&mut self, column: &str) -> Result<usize, MalformedInput> {
        let keep: Vec<bool> = {
            let mut seen = HashSet::new();
            self.require_column(column)?
                .values
                .iter()
                .map(|cell| seen.insert(CellKey::of(cell.as_ref())))
                .collect()
        };
        let before = self.rows;
        self.retain_rows(&keep);
        Ok(before - self.rows)
    }

    pub fn row(&self, idx: usize) -> Vec<Option<&Value>> {
        self.columns.iter().map(|c| c.get(idx)).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Option<&Value>>> + '_ {
        (0..self.rows).map(move |idx| self.row(idx))
    }
}

#[derive(PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Missing,
    Text(&'a str),
    Integer(i64),
    Float(u64),
    Timestamp(NaiveDateTime),
}

impl<'a> CellKey<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value {
            None => CellKey::Missing,
            Some(Value::Text(s)) => CellKey::Text(s),
            Some(Value::Integer(i)) => CellKey::Integer(*i),
            // -0.0 and 0.0 compare equal
            Some(Value::Float(f)) => CellKey::Float(if *f == 0.0 { 0 } else { f.to_bits() }),
            Some(Value::Timestamp(ts)) => CellKey::Timestamp(*ts),
        }
    }
}
