//! Merge and sort stage
//!
//! Stacks the per-record tables of one technique into a single table and
//! orders it by the configured key precedence. Columns missing from a table
//! are filled with nulls; conflicting column types widen to a common type.

use crate::error::Result;
use crate::models::Technique;
use polars::prelude::*;
use tracing::{debug, warn};

/// Stack tables vertically over the union of their columns
pub fn concat_tables(mut tables: Vec<DataFrame>) -> Result<DataFrame> {
    match tables.len() {
        0 => return Ok(DataFrame::empty()),
        1 => return Ok(tables.remove(0)),
        _ => {}
    }

    let frames: Vec<LazyFrame> = tables.into_iter().map(IntoLazy::lazy).collect();
    let combined = concat_lf_diagonal(
        frames,
        UnionArgs {
            to_supertypes: true,
            ..Default::default()
        },
    )?;
    Ok(combined.collect()?)
}

/// Stable sort on `keys`, skipping keys that name no column
pub fn sort_table(technique: Technique, table: DataFrame, keys: &[String]) -> Result<DataFrame> {
    let schema = table.schema();
    let present: Vec<Expr> = keys
        .iter()
        .filter(|key| {
            let found = schema.contains(key.as_str());
            if !found {
                warn!("{} table has no '{}' column to sort on", technique, key);
            }
            found
        })
        .map(|key| col(key.as_str()))
        .collect();

    if present.is_empty() {
        return Ok(table);
    }

    debug!("Sorting {} table on {} key(s)", technique, present.len());
    let sorted = table
        .lazy()
        .sort_by_exprs(present, SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;
    Ok(sorted)
}

/// Concatenate and sort every table of one technique
pub fn merge_tables(
    technique: Technique,
    tables: Vec<DataFrame>,
    keys: &[String],
) -> Result<DataFrame> {
    let merged = concat_tables(tables)?;
    sort_table(technique, merged, keys)
}
