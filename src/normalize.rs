//! Categorical rewrites and derived columns applied after loading.
//!
//! Every step keeps the row count unchanged. Derived columns are appended in
//! creation order, or replace an existing column of the same name in place.

use chrono::{Local, NaiveDateTime, Timelike};
use log::{debug, info};

use crate::{
    config::{CategorySettings, ChartTableSplit, FlagRule, NormalizeSettings, PeriodSubjectSplit},
    data::Value,
    dataset::{Column, Dataset},
    error::MalformedInput,
    schema::ColumnType,
};

/// Current local time truncated to whole seconds, taken once per run.
pub fn batch_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn normalize(
    dataset: &mut Dataset,
    settings: &NormalizeSettings,
    loaded_at: NaiveDateTime,
) -> Result<(), MalformedInput> {
    let rewritten = confirm_bug_category(dataset, &settings.category)?;
    info!(
        "Normalized {} '{}' value(s) across {} row(s)",
        rewritten,
        settings.category.column,
        dataset.len()
    );
    split_period_and_subject(dataset, &settings.period_subject)?;
    split_pic_and_form(dataset, &settings.chart_table)?;
    add_time_stamp(dataset, &settings.loaded_at, loaded_at)?;
    Ok(())
}

fn require_text<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Column, MalformedInput> {
    let column = dataset.require_column(name)?;
    match column.dtype() {
        ColumnType::Text | ColumnType::Unknown => Ok(column),
        found => Err(MalformedInput::NonTextColumn {
            column: name.to_string(),
            found,
        }),
    }
}

/// Collapses free-text categories onto canonical labels.
///
/// Rules run in order and each one overwrites every cell containing its token,
/// so when a value carries tokens of two rules the later rule wins. Returns the
/// number of cell rewrites performed.
pub fn confirm_bug_category(
    dataset: &mut Dataset,
    settings: &CategorySettings,
) -> Result<usize, MalformedInput> {
    require_text(dataset, &settings.column)?;
    let Some(column) = dataset.column_mut(&settings.column) else {
        return Err(MalformedInput::MissingColumns(vec![settings.column.clone()]));
    };
    let mut rewritten = 0;
    for rule in &settings.rules {
        for cell in column.values_mut().iter_mut() {
            let matches = matches!(cell, Some(Value::Text(raw)) if raw.contains(rule.token.as_str()));
            if matches {
                *cell = Some(Value::Text(rule.label.clone()));
                rewritten += 1;
            }
        }
        debug!("Applied category rule '{}' -> '{}'", rule.token, rule.label);
    }
    Ok(rewritten)
}

fn split_at_char(value: &str, width: usize) -> (&str, &str) {
    let cut = value
        .char_indices()
        .nth(width)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    value.split_at(cut)
}

/// Splits `period+subject` values by character position. No length check: a
/// value shorter than the width becomes the whole period with an empty subject.
pub fn split_period_and_subject(
    dataset: &mut Dataset,
    split: &PeriodSubjectSplit,
) -> Result<(), MalformedInput> {
    let source = require_text(dataset, &split.source)?;
    let (periods, subjects): (Vec<_>, Vec<_>) = source
        .values()
        .iter()
        .map(|cell| match cell.as_ref().and_then(Value::as_text) {
            Some(raw) => {
                let (period, subject) = split_at_char(raw, split.width);
                (
                    Some(Value::Text(period.to_string())),
                    Some(Value::Text(subject.to_string())),
                )
            }
            None => (None, None),
        })
        .unzip();
    dataset.set_column(Column::new(&split.period, ColumnType::Text, periods))?;
    dataset.set_column(Column::new(&split.subject, ColumnType::Text, subjects))?;
    Ok(())
}

fn flag_column(source: &Column, rule: &FlagRule) -> Column {
    let values = source
        .values()
        .iter()
        .map(|cell| {
            let hit = matches!(cell, Some(Value::Text(raw)) if *raw == rule.marker);
            let label = if hit { &rule.present } else { &rule.absent };
            Some(Value::Text(label.clone()))
        })
        .collect();
    Column::new(&rule.column, ColumnType::Text, values)
}

/// Expands the chart/table flag into two independent yes/no columns.
pub fn split_pic_and_form(
    dataset: &mut Dataset,
    split: &ChartTableSplit,
) -> Result<(), MalformedInput> {
    let source = dataset.require_column(&split.source)?;
    let chart = flag_column(source, &split.chart);
    let table = flag_column(source, &split.table);
    dataset.set_column(chart)?;
    dataset.set_column(table)?;
    Ok(())
}

pub fn add_time_stamp(
    dataset: &mut Dataset,
    column: &str,
    at: NaiveDateTime,
) -> Result<(), MalformedInput> {
    let values = vec![Some(Value::Timestamp(at)); dataset.len()];
    dataset.set_column(Column::new(column, ColumnType::Timestamp, values))
}
