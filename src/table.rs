//! Table assembly and conversions between [`Value`] and polars columns.
//!
//! Channel tables are plain polars `DataFrame`s holding one row per sample.
//! Assembly broadcasts a sweep's metadata onto every row and places the
//! metadata columns in front of the data columns.

use crate::error::{Result, SessionError};
use crate::extract::common::ChannelMetadata;
use crate::models::{Technique, Value};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Build a channel table from named numeric columns of equal length
pub fn channel_table(
    technique: Technique,
    columns: Vec<(String, Vec<Option<f64>>)>,
) -> Result<DataFrame> {
    if let Some((first_name, first)) = columns.first() {
        for (name, values) in &columns {
            if values.len() != first.len() {
                return Err(SessionError::MalformedRecord {
                    technique,
                    reason: format!(
                        "column '{}' has {} samples but '{}' has {}",
                        name,
                        values.len(),
                        first_name,
                        first.len()
                    ),
                });
            }
        }
    }

    let columns = columns
        .into_iter()
        .map(|(name, values)| Column::new(name.into(), values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Prepend `metadata` as constant columns, in metadata key order.
///
/// Data columns that share a name with a metadata key are replaced by the
/// metadata value. The row count of `data` is preserved.
pub fn assemble(data: DataFrame, metadata: &ChannelMetadata) -> Result<DataFrame> {
    let height = data.height();

    let mut columns: Vec<Column> = metadata
        .entries()
        .iter()
        .map(|(name, value)| constant_column(name, value, height))
        .collect();

    for column in data.get_columns() {
        if metadata.get(column.name().as_str()).is_none() {
            columns.push(column.clone());
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Column repeating `value` `height` times
pub fn constant_column(name: &str, value: &Value, height: usize) -> Column {
    let name: PlSmallStr = name.into();
    match value {
        Value::Null => Column::new(name, vec![None::<String>; height]),
        Value::Bool(b) => Column::new(name, vec![*b; height]),
        Value::Int(i) => Column::new(name, vec![*i; height]),
        Value::Float(f) => Column::new(name, vec![*f; height]),
        Value::Text(s) => Column::new(name, vec![s.clone(); height]),
    }
}

/// Column holding `values`, typed by the values it contains.
///
/// All booleans become `Boolean`, all integers `Int64`, integers mixed with
/// floats `Float64`; anything else is rendered as `String`. Nulls are kept.
pub fn values_column(name: &str, values: &[Value]) -> Column {
    let name: PlSmallStr = name.into();
    let non_null = || values.iter().filter(|v| !v.is_null());

    if non_null().all(|v| matches!(v, Value::Bool(_))) && non_null().next().is_some() {
        let data: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Column::new(name, data);
    }

    if non_null().all(|v| matches!(v, Value::Int(_))) && non_null().next().is_some() {
        let data: Vec<Option<i64>> = values.iter().map(Value::as_i64).collect();
        return Column::new(name, data);
    }

    if non_null().all(|v| matches!(v, Value::Int(_) | Value::Float(_)))
        && non_null().next().is_some()
    {
        let data: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        return Column::new(name, data);
    }

    let data: Vec<Option<String>> = values
        .iter()
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    Column::new(name, data)
}

/// Convert one polars cell into a [`Value`]
pub fn any_to_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int8(i) => Value::Int(i as i64),
        AnyValue::Int16(i) => Value::Int(i as i64),
        AnyValue::Int32(i) => Value::Int(i as i64),
        AnyValue::Int64(i) => Value::Int(i),
        AnyValue::UInt8(i) => Value::Int(i as i64),
        AnyValue::UInt16(i) => Value::Int(i as i64),
        AnyValue::UInt32(i) => Value::Int(i as i64),
        AnyValue::UInt64(i) => Value::Int(i as i64),
        AnyValue::Float32(f) => Value::Float(f as f64),
        AnyValue::Float64(f) => Value::Float(f),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        other => Value::Text(other.to_string()),
    }
}

/// One table row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Every column of one column as values
pub fn column_values(column: &Column) -> Result<Vec<Value>> {
    (0..column.len())
        .map(|i| Ok(any_to_value(column.get(i)?)))
        .collect()
}

/// Materialise every row of `df`
pub fn rows(df: &DataFrame) -> Result<Vec<Row>> {
    let mut rows = vec![Row::default(); df.height()];
    for column in df.get_columns() {
        let name = column.name().to_string();
        for (row, value) in rows.iter_mut().zip(column_values(column)?) {
            row.set(name.clone(), value);
        }
    }
    Ok(rows)
}
