//! Per-technique extraction of raw records into assembled tables
//!
//! Every technique follows the same skeleton: check that the record has
//! channels, build the shared metadata, then turn each sub-channel into a
//! data table, broadcast its metadata onto it and stack the results. The
//! technique modules only supply the sub-channel shape and data columns.
//!
//! # Failure scopes
//!
//! - A title that does not match the technique pattern drops only that
//!   sub-channel (or yields no discriminators, per [`TitlePolicy`])
//! - Any other error aborts the whole record
//! - A record whose sub-channels were all dropped fails with the first
//!   title mismatch

pub mod common;
pub mod cv;
pub mod eis;
pub mod lsv;

use crate::config::TitlePolicy;
use crate::error::{Result, SessionError};
use crate::merge::concat_tables;
use crate::method::{KeySelection, MethodParams};
use crate::models::{Measurement, Technique};
use crate::table::assemble;
use common::{ChannelMetadata, channel_discriminators, common_entries};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

/// Assembled table of one record plus the sub-channels it had to drop
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub table: DataFrame,
    pub channels_skipped: usize,
}

/// Extract one matched record for `technique`
pub fn extract(
    technique: Technique,
    measurement: &Measurement,
    params: &MethodParams,
    policy: TitlePolicy,
) -> Result<RecordTable> {
    match technique {
        Technique::Eis => eis::extract(measurement, params, policy),
        Technique::Cv => cv::extract(measurement, params, policy),
        Technique::Lsv => lsv::extract(measurement, params, policy),
    }
}

/// Numeric parameter the technique cannot do without
pub(crate) fn required_positive(
    technique: Technique,
    params: &MethodParams,
    key: &str,
) -> Result<f64> {
    let Some(param) = params.get(key) else {
        return Err(SessionError::MissingRequiredParameter {
            technique,
            key: key.to_string(),
        });
    };

    let value = param
        .as_scalar()
        .and_then(|v| v.as_f64())
        .ok_or_else(|| SessionError::InvalidParameter {
            technique,
            key: key.to_string(),
            reason: format!("expected a single number, got '{}'", param.to_value()),
        })?;

    if !(value.is_finite() && value > 0.0) {
        return Err(SessionError::InvalidParameter {
            technique,
            key: key.to_string(),
            reason: format!("must be a positive number, got {}", value),
        });
    }

    Ok(value)
}

/// Run the shared channel loop over a record's sub-channels.
///
/// `title` picks the sub-channel title and `build` its data table; the
/// metadata is broadcast here.
pub(crate) fn extract_channels<C>(
    technique: Technique,
    measurement: &Measurement,
    channels: &[C],
    params: &MethodParams,
    policy: TitlePolicy,
    title: impl Fn(&C) -> &str,
    build: impl Fn(&C) -> Result<DataFrame>,
) -> Result<RecordTable> {
    if channels.is_empty() {
        return Err(SessionError::EmptyChannelList { technique });
    }

    let common = common_entries(measurement)?;
    let parameters = params.to_entries(KeySelection::Only(technique.method_keys()));

    let mut tables = Vec::with_capacity(channels.len());
    let mut first_mismatch = None;
    let mut channels_skipped = 0;

    for channel in channels {
        let channel_title = title(channel);
        let discriminators = match channel_discriminators(technique, channel_title, policy) {
            Ok(entries) => entries,
            Err(e) if e.is_channel_scoped() => {
                warn!(
                    "Skipping {} channel {:?} of '{}': {}",
                    technique, channel_title, measurement.title, e
                );
                channels_skipped += 1;
                first_mismatch.get_or_insert(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let mut metadata = ChannelMetadata::new(common.clone());
        metadata.extend(discriminators);
        metadata.extend(parameters.iter().cloned());
        let metadata = metadata.finish()?;

        let data = build(channel)?;
        tables.push(assemble(data, &metadata)?);
    }

    if tables.is_empty() {
        // Every channel was dropped, so the record has nothing to offer
        return Err(first_mismatch.unwrap_or(SessionError::EmptyChannelList { technique }));
    }

    debug!(
        "Extracted {} {} channel(s) from '{}'",
        tables.len(),
        technique,
        measurement.title
    );

    Ok(RecordTable {
        table: concat_tables(tables)?,
        channels_skipped,
    })
}
