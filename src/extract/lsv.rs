//! Linear sweep voltammetry extraction

use super::common::{curve_signals, dense};
use super::{RecordTable, extract_channels, required_positive};
use crate::config::TitlePolicy;
use crate::constants::{SCAN_RATE_KEY, columns};
use crate::error::Result;
use crate::features::SweepFeatures;
use crate::method::MethodParams;
use crate::models::{Curve, Measurement, Technique};
use crate::table::channel_table;
use polars::prelude::*;

pub fn extract(
    measurement: &Measurement,
    params: &MethodParams,
    policy: TitlePolicy,
) -> Result<RecordTable> {
    let scan_rate = required_positive(Technique::Lsv, params, SCAN_RATE_KEY)?;

    extract_channels(
        Technique::Lsv,
        measurement,
        measurement.curves.as_slice(),
        params,
        policy,
        |curve: &Curve| curve.title.as_str(),
        |curve| curve_data(curve, scan_rate),
    )
}

fn curve_data(curve: &Curve, scan_rate: f64) -> Result<DataFrame> {
    let (voltage, current) = curve_signals(Technique::Lsv, curve)?;
    let charge = SweepFeatures::linear(&dense(&voltage), &dense(&current), scan_rate);

    let mut df = channel_table(
        Technique::Lsv,
        vec![
            (columns::VOLTAGE.to_string(), voltage),
            (columns::CURRENT.to_string(), current),
        ],
    )?;
    df.with_column(Column::new(columns::CHARGE.into(), charge))?;
    Ok(df)
}
