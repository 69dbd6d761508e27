//! Orchestrator tests
//!
//! Records are built as raw JSON, the same shape the loader hands over.

pub mod scenarios;

use crate::models::Value;
use crate::table::column_values;
use polars::prelude::DataFrame;
use serde_json::{Value as Json, json};

/// 2024-01-01T00:00:00 in 100 ns ticks since 0001-01-01
pub const JAN_2024: i64 = 638_396_640_000_000_000;

/// One hour in ticks
pub const HOUR: i64 = 36_000_000_000;

pub fn points(values: &[f64]) -> Json {
    Json::Array(values.iter().map(|v| json!({ "V": v })).collect())
}

pub fn eis_channel(title: &str, frequencies: &[f64], z: &[f64]) -> Json {
    json!({
        "Title": title,
        "DataSet": {"Values": [
            {"Description": "Frequency", "Unit": {"S": "Hz", "Q": "Frequency"}, "DataValues": points(frequencies)},
            {"Description": "Z", "Unit": {"S": "Ω", "Q": "Z"}, "DataValues": points(z)},
            {"Description": "Time", "Unit": {"S": "s", "Q": "Time"}, "DataValues": points(frequencies)},
        ]}
    })
}

pub fn eis_record(title: &str, ticks: i64, method: &str, channels: Vec<Json>) -> Json {
    json!({
        "Title": title,
        "TimeStamp": ticks,
        "Method": method,
        "EISDataList": channels,
    })
}

pub fn curve(title: &str, voltage: &[f64], current: &[f64]) -> Json {
    json!({
        "Title": title,
        "XAxisDataArray": {"Description": "potential", "Unit": {"S": "V", "Q": "Potential"}, "DataValues": points(voltage)},
        "YAxisDataArray": {"Description": "current", "Unit": {"S": "A", "Q": "Current"}, "DataValues": points(current)},
    })
}

pub fn curve_record(title: &str, ticks: i64, method: &str, curves: Vec<Json>) -> Json {
    json!({
        "Title": title,
        "TimeStamp": ticks,
        "Method": method,
        "Curves": curves,
    })
}

pub fn column(df: &DataFrame, name: &str) -> Vec<Value> {
    column_values(df.column(name).unwrap()).unwrap()
}

pub fn floats(df: &DataFrame, name: &str) -> Vec<f64> {
    column(df, name)
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect()
}

pub fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}
