//! Impedance sweep extraction
//!
//! Each entry of `EISDataList` is one channel; its data set holds one array
//! per measured quantity, labelled by a free-text description.

use super::{RecordTable, extract_channels};
use crate::config::TitlePolicy;
use crate::constants::{EIS_QUANTITIES, canonical_quantity};
use crate::error::Result;
use crate::method::MethodParams;
use crate::models::{EisChannel, Measurement, Technique};
use crate::table::channel_table;
use polars::prelude::DataFrame;
use tracing::debug;

pub fn extract(
    measurement: &Measurement,
    params: &MethodParams,
    policy: TitlePolicy,
) -> Result<RecordTable> {
    extract_channels(
        Technique::Eis,
        measurement,
        measurement.eis_data_list.as_slice(),
        params,
        policy,
        |channel: &EisChannel| channel.title.as_str(),
        channel_data,
    )
}

/// Quantity columns of one channel, in data-set order.
///
/// Unknown descriptions are dropped; a repeated quantity keeps its first
/// position and its last values.
fn channel_data(channel: &EisChannel) -> Result<DataFrame> {
    let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();

    for array in &channel.data_set.values {
        let label = array.description.trim().to_lowercase();
        let name = canonical_quantity(&label);
        if !EIS_QUANTITIES.contains(&name) {
            debug!("Ignoring impedance quantity {:?}", array.description);
            continue;
        }

        let values = array.values();
        match columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = values,
            None => columns.push((name.to_string(), values)),
        }
    }

    channel_table(Technique::Eis, columns)
}
