//! Row-level enrichment of assembled tables
//!
//! An enrichment pairs a row predicate with a row transform. Pairs run in
//! order; each one sees the table as left by the previous pair. A transform
//! returns only the columns it wants to change, and only matched rows are
//! written. Row order and row count never change, and an existing column
//! keeps its dtype: an update that does not fit it is an error.

use crate::constants::columns;
use crate::error::{Result, SessionError};
use crate::models::Value;
use crate::table::{Row, column_values, rows, values_column};
use polars::prelude::{Column, DataFrame, DataType};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Column updates returned by a transform
pub type Updates = BTreeMap<String, Value>;

type Predicate = Box<dyn Fn(&Row) -> bool + Send + Sync>;
type Transform = Box<dyn Fn(&Row) -> Updates + Send + Sync>;

/// A named (predicate, transform) pair
pub struct Enrichment {
    name: String,
    predicate: Predicate,
    transform: Transform,
}

impl Enrichment {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Row) -> bool + Send + Sync + 'static,
        transform: impl Fn(&Row) -> Updates + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            transform: Box::new(transform),
        }
    }

    /// Transform applied to every row
    pub fn for_all(
        name: impl Into<String>,
        transform: impl Fn(&Row) -> Updates + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, |_| true, transform)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply this pair to `table`
    pub fn apply(&self, mut table: DataFrame) -> Result<DataFrame> {
        let height = table.height();
        let snapshot = rows(&table)?;

        let mut pending: BTreeMap<String, Vec<Option<Value>>> = BTreeMap::new();
        let mut matched = 0;
        for (i, row) in snapshot.iter().enumerate() {
            if !(self.predicate)(row) {
                continue;
            }
            matched += 1;
            for (column, value) in (self.transform)(row) {
                pending.entry(column).or_insert_with(|| vec![None; height])[i] = Some(value);
            }
        }

        if matched == 0 {
            debug!("Enrichment '{}' matched no rows", self.name);
            return Ok(table);
        }
        debug!(
            "Enrichment '{}' matched {} of {} rows, writing {} column(s)",
            self.name,
            matched,
            height,
            pending.len()
        );

        for (column, updates) in pending {
            let written = match table.column(&column) {
                Ok(existing) if existing.null_count() < existing.len() => {
                    self.overwrite(existing, updates)?
                }
                _ => {
                    let values: Vec<Value> = updates
                        .into_iter()
                        .map(|update| update.unwrap_or(Value::Null))
                        .collect();
                    values_column(&column, &values)
                }
            };
            table.with_column(written)?;
        }

        Ok(table)
    }

    /// Write `updates` into `existing`, keeping its dtype and unmatched cells
    fn overwrite(&self, existing: &Column, updates: Vec<Option<Value>>) -> Result<Column> {
        let dtype = existing.dtype().clone();
        let mut values = column_values(existing)?;

        for (slot, update) in values.iter_mut().zip(updates) {
            let Some(value) = update else {
                continue;
            };
            *slot = fit_value(&value, &dtype).ok_or_else(|| SessionError::Enrichment {
                name: self.name.clone(),
                column: existing.name().to_string(),
                reason: format!("{:?} does not fit a {} column", value, dtype),
            })?;
        }

        Ok(values_column(existing.name().as_str(), &values).cast(&dtype)?)
    }
}

/// `value` converted to the kind of value a `dtype` column holds
fn fit_value(value: &Value, dtype: &DataType) -> Option<Value> {
    match (value, dtype) {
        (Value::Null, _) => Some(Value::Null),
        (Value::Text(s), DataType::String) => Some(Value::Text(s.clone())),
        (other, DataType::String) => Some(Value::Text(other.to_string())),
        (Value::Bool(b), DataType::Boolean) => Some(Value::Bool(*b)),
        (Value::Int(i), dt) if dt.is_integer() => Some(Value::Int(*i)),
        (Value::Float(f), dt) if dt.is_integer() && f.is_finite() && f.fract() == 0.0 => {
            Some(Value::Int(*f as i64))
        }
        (Value::Int(i), dt) if dt.is_float() => Some(Value::Float(*i as f64)),
        (Value::Float(f), dt) if dt.is_float() => Some(Value::Float(*f)),
        _ => None,
    }
}

impl fmt::Debug for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enrichment").field("name", &self.name).finish()
    }
}

/// Run every enrichment over `table`, in order
pub fn apply_enrichments(table: DataFrame, enrichments: &[Enrichment]) -> Result<DataFrame> {
    enrichments
        .iter()
        .try_fold(table, |table, enrichment| enrichment.apply(table))
}

/// Channel offset of rows recorded on the bottom block
pub const BOTTOM_BLOCK_OFFSET: i64 = 16;

/// Device and block from titles shaped `<date> <animal> <implant> N<dd> <block>`
pub fn device_and_block(title: &str) -> Updates {
    let parts: Vec<&str> = title.split(' ').collect();
    let mut updates = Updates::new();
    if parts.len() < 5 {
        return updates;
    }

    let digits = parts[3].trim_start_matches(['N', 'n']);
    if let Ok(device) = digits.parse::<i64>() {
        updates.insert(columns::DEVICE.to_string(), Value::Text(format!("N{:02}", device)));
        updates.insert(columns::BLOCK.to_string(), Value::from(parts[4]));
    }
    updates
}

/// Device/block parsing followed by the bottom-block channel offset
pub fn default_enrichments() -> Vec<Enrichment> {
    vec![
        Enrichment::for_all("device_block_from_title", |row| {
            device_and_block(row.get_str(columns::TITLE).unwrap_or_default())
        }),
        Enrichment::new(
            "bottom_block_channel_offset",
            |row| row.get_str(columns::BLOCK) == Some("BOT"),
            |row| {
                let channel = row.get_i64(columns::CHANNEL).unwrap_or(0);
                Updates::from([(
                    columns::CHANNEL.to_string(),
                    Value::Int(channel + BOTTOM_BLOCK_OFFSET),
                )])
            },
        ),
    ]
}
