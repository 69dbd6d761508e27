//! Core data structures and types for session processing.
//!
//! Defines scalar values, the supported techniques, the raw session model
//! decoded from the instrument export, and processing statistics.

use crate::constants::method_ids;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar carried by parameter blocks, metadata and table rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps the decimal point, so the text parses back as a float
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Parameter slot: a single scalar, or every value of a repeated key in line order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Scalar(Value),
    List(Vec<Value>),
}

impl Param {
    /// Add a repeated occurrence, promoting a scalar to a list
    pub fn push(&mut self, value: Value) {
        match self {
            Param::Scalar(first) => {
                let first = std::mem::replace(first, Value::Null);
                *self = Param::List(vec![first, value]);
            }
            Param::List(values) => values.push(value),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Param::Scalar(v) => Some(v),
            Param::List(_) => None,
        }
    }

    /// Flatten into a single metadata value; lists become comma-separated text
    pub fn to_value(&self) -> Value {
        match self {
            Param::Scalar(v) => v.clone(),
            Param::List(values) => Value::Text(
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }
}

/// Measurement techniques supported by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Technique {
    /// Electrochemical impedance spectroscopy sweep
    Eis,
    /// Cyclic voltammetry
    Cv,
    /// Linear sweep voltammetry
    Lsv,
}

impl Technique {
    pub const ALL: [Technique; 3] = [Technique::Eis, Technique::Cv, Technique::Lsv];

    /// Value of the `method_id` parameter that selects this technique
    pub fn method_id(&self) -> &'static str {
        match self {
            Technique::Eis => method_ids::EIS,
            Technique::Cv => method_ids::CV,
            Technique::Lsv => method_ids::LSV,
        }
    }

    pub fn from_method_id(method_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.method_id().eq_ignore_ascii_case(method_id.trim()))
    }

    /// Upper-case label used in file names and console output
    pub fn label(&self) -> &'static str {
        match self {
            Technique::Eis => "EIS",
            Technique::Cv => "CV",
            Technique::Lsv => "LSV",
        }
    }

    /// Default sort keys of the merged table
    pub fn sort_keys(&self) -> &'static [&'static str] {
        match self {
            Technique::Eis => &["date", "channel"],
            Technique::Cv => &["date", "channel", "cycle"],
            Technique::Lsv => &["date", "channel"],
        }
    }

    /// Parameter keys projected into channel metadata during extraction
    pub fn method_keys(&self) -> &'static [&'static str] {
        match self {
            Technique::Eis => &["method_id", "min_freq", "max_freq", "n_freq"],
            Technique::Cv => &[
                "method_id",
                "e_begin",
                "e_vtx1",
                "e_vtx2",
                "e_step",
                "scan_rate",
                "n_scans",
            ],
            Technique::Lsv => &["method_id", "e_begin", "e_end", "e_step", "scan_rate"],
        }
    }

    /// Parameter keys shown by the measurement listing
    pub fn info_keys(&self) -> &'static [&'static str] {
        match self {
            Technique::Eis => &[],
            Technique::Cv => &["scan_rate", "n_scans"],
            Technique::Lsv => &["scan_rate"],
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Top-level session export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Session {
    #[serde(default)]
    pub core_version: String,

    /// Raw records, decoded one at a time so a bad record cannot sink the file
    #[serde(default)]
    pub measurements: Vec<serde_json::Value>,
}

/// One raw measurement record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Measurement {
    #[serde(default)]
    pub title: String,

    /// 100 ns ticks since 0001-01-01T00:00:00
    #[serde(default)]
    pub time_stamp: i64,

    /// Free-text parameter block
    #[serde(default)]
    pub method: String,

    #[serde(default, rename = "EISDataList")]
    pub eis_data_list: Vec<EisChannel>,

    #[serde(default)]
    pub curves: Vec<Curve>,
}

impl Measurement {
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Ok(Measurement::deserialize(value)?)
    }
}

/// Impedance sub-channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EisChannel {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub data_set: DataSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSet {
    #[serde(default)]
    pub values: Vec<DataArray>,
}

/// Voltammetry sub-channel: current plotted against potential
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Curve {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub x_axis_data_array: DataArray,

    #[serde(default)]
    pub y_axis_data_array: DataArray,
}

/// Numeric array tagged by a description label and a unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataArray {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub unit: Option<Unit>,

    #[serde(default)]
    pub data_values: Vec<DataPoint>,
}

impl DataArray {
    pub fn values(&self) -> Vec<Option<f64>> {
        self.data_values.iter().map(|p| p.v).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "S", default)]
    pub symbol: String,

    #[serde(rename = "Q", default)]
    pub quantity: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(rename = "V", default)]
    pub v: Option<f64>,
}

/// A record that could not be turned into a table
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub index: usize,
    pub technique: Option<Technique>,
    pub message: String,
}

/// Outcome counters for one technique
#[derive(Debug, Clone, Default)]
pub struct TechniqueStats {
    pub records_matched: usize,
    pub records_succeeded: usize,
    pub records_failed: usize,
    pub channels_skipped: usize,
    pub total_rows: usize,
    pub from_cache: bool,
    pub failures: Vec<RecordFailure>,
}

/// Processing statistics for one session
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub records_total: usize,
    pub records_undecodable: Vec<RecordFailure>,
    pub techniques: Vec<(Technique, TechniqueStats)>,
}

impl ProcessingStats {
    pub fn for_technique(&self, technique: Technique) -> Option<&TechniqueStats> {
        self.techniques
            .iter()
            .find(|(t, _)| *t == technique)
            .map(|(_, stats)| stats)
    }

    /// Every skipped record, undecodable ones first
    pub fn failures(&self) -> impl Iterator<Item = &RecordFailure> {
        self.records_undecodable
            .iter()
            .chain(self.techniques.iter().flat_map(|(_, s)| s.failures.iter()))
    }
}

/// Listing entry for one recognised record
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementInfo {
    pub index: usize,
    pub technique: Technique,
    pub title: String,
    pub date: String,
    pub measurement_id: String,
    pub params: Vec<(String, Value)>,
}
