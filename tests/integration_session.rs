//! End-to-end tests: session file on disk to merged technique tables
//!
//! Each test writes a small UTF-16 `.pssession` file (with the trailing bytes
//! real exports carry) into a temporary directory and runs the full
//! load, extract, enrich, merge and cache pipeline.

use pssession_processor::table::column_values;
use pssession_processor::{
    CsvTableCache, SessionConfig, SessionProcessor, Technique, Value, default_enrichments,
    load_session,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 2024-03-05T10:00:00 in 100 ns ticks since 0001-01-01
const MARCH_2024: i64 = 638_452_296_000_000_000;

fn points(values: &[f64]) -> serde_json::Value {
    json!(values.iter().map(|v| json!({ "V": v })).collect::<Vec<_>>())
}

fn session_document() -> serde_json::Value {
    json!({
        "Type": "PalmSens.DataFiles.SessionFile",
        "CoreVersion": "5.11.1006",
        "Measurements": [
            {
                "Title": "2024-03-05 R12 I3 N4 BOT",
                "TimeStamp": MARCH_2024,
                "Method": "#method\r\nMETHOD_ID=EIS\r\nMIN_FREQ=1\r\nMAX_FREQ=100000\r\nN_FREQ=3\r\n",
                "EISDataList": [
                    {
                        "Title": "CH 2: 3 freqs",
                        "DataSet": {"Values": [
                            {"Description": "Frequency", "Unit": {"S": "Hz", "Q": "Frequency"}, "DataValues": points(&[1.0, 100.0, 100000.0])},
                            {"Description": "Z", "Unit": {"S": "Ω", "Q": "Z"}, "DataValues": points(&[1000.0, 500.0, 10.0])},
                            {"Description": "Phase", "Unit": {"S": "°", "Q": "-Phase"}, "DataValues": points(&[60.0, 45.0, 5.0])},
                            {"Description": "Capacitance''", "Unit": {"S": "F", "Q": "C''"}, "DataValues": points(&[1e-6, 2e-6, 3e-6])}
                        ]}
                    },
                    {
                        "Title": "CH 1: 3 freqs",
                        "DataSet": {"Values": [
                            {"Description": "Frequency", "Unit": {"S": "Hz", "Q": "Frequency"}, "DataValues": points(&[1.0, 100.0, 100000.0])},
                            {"Description": "Z", "Unit": {"S": "Ω", "Q": "Z"}, "DataValues": points(&[900.0, 400.0, 9.0])}
                        ]}
                    }
                ]
            },
            {
                "Title": "2024-03-05 R12 I3 N4 TOP",
                "TimeStamp": MARCH_2024,
                "Method": "METHOD_ID=CV\r\nE_BEGIN=0\r\nE_VTX1=0.2\r\nE_VTX2=-0.2\r\nE_STEP=0.1\r\nSCAN_RATE=0.1\r\nN_SCANS=1\r\n",
                "Curves": [
                    {
                        "Title": "CV i vs E Scan 1 Channel 5",
                        "XAxisDataArray": {"Description": "potential", "DataValues": points(&[0.0, 0.1, 0.2, 0.1, 0.0, -0.1, -0.2])},
                        "YAxisDataArray": {"Description": "current", "DataValues": points(&[1e-6, 2e-6, 3e-6, 1e-6, -1e-6, -2e-6, -3e-6])}
                    }
                ]
            },
            {
                "Title": "broken lsv",
                "TimeStamp": MARCH_2024,
                "Method": "METHOD_ID=LSV\r\nE_BEGIN=0\r\nE_END=1\r\n",
                "Curves": [
                    {"Title": "LSV i vs E Channel 1", "XAxisDataArray": {"DataValues": points(&[0.0, 1.0])}, "YAxisDataArray": {"DataValues": points(&[0.0, 1.0])}}
                ]
            }
        ]
    })
}

/// Encode like the instrument software: UTF-16LE with a byte-order mark and trailing junk
fn write_session(dir: &Path, name: &str) -> PathBuf {
    let text = format!("{}\u{0}\u{0}\u{0}", session_document());
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn column(df: &polars::prelude::DataFrame, name: &str) -> Vec<Value> {
    column_values(df.column(name).unwrap()).unwrap()
}

#[test]
fn test_full_pipeline_from_utf16_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_session(temp_dir.path(), "run.pssession");

    let tables = SessionProcessor::all(SessionConfig::default())
        .unwrap()
        .process_file(&path, &default_enrichments())
        .unwrap();

    // Impedance: two channels, bottom block shifts channels by 16
    let eis = tables.get(Technique::Eis).unwrap();
    assert_eq!(eis.height(), 6);
    assert_eq!(
        column(eis, "channel"),
        vec![
            Value::Int(17),
            Value::Int(17),
            Value::Int(17),
            Value::Int(18),
            Value::Int(18),
            Value::Int(18)
        ]
    );
    assert!(column(eis, "device").iter().all(|d| *d == Value::from("N04")));
    assert!(column(eis, "n_freq").iter().all(|n| *n == Value::Int(3)));
    // The channel without capacitance data gets nulls after merging
    assert_eq!(column(eis, "cim")[0], Value::Null);
    assert!(column(eis, "date")
        .iter()
        .all(|d| *d == Value::from("2024-03-05T10:00:00.000000")));

    // Both impedance channels share the record id but not the sweep id
    let sweep_ids = column(eis, "sweep_id");
    assert_ne!(sweep_ids[0], sweep_ids[3]);
    let record_ids = column(eis, "measurement_id");
    assert_eq!(record_ids[0], record_ids[3]);

    // Cyclic voltammetry: top block keeps its channel number
    let cv = tables.get(Technique::Cv).unwrap();
    assert_eq!(cv.height(), 7);
    assert!(column(cv, "channel").iter().all(|c| *c == Value::Int(5)));
    assert_eq!(
        column(cv, "sweep_dir"),
        [1, 1, 1, -1, -1, -1, -1].map(Value::Int).to_vec()
    );

    // Linear sweep record lacks a scan rate and is reported, not fatal
    assert!(tables.get(Technique::Lsv).is_none());
    let lsv_stats = tables.stats.for_technique(Technique::Lsv).unwrap();
    assert_eq!(lsv_stats.records_failed, 1);
    assert_eq!(lsv_stats.failures[0].index, 2);

    // Parsed JSON and merged tables are cached next to the file
    assert!(temp_dir.path().join("run.pssession.json").is_file());
    let cache = CsvTableCache::for_session(&path, None);
    assert!(cache.path_for(Technique::Eis).is_file());
    assert!(cache.path_for(Technique::Cv).is_file());
    assert!(!cache.path_for(Technique::Lsv).exists());
}

#[test]
fn test_second_run_is_served_from_cache() {
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("cache");
    let path = write_session(temp_dir.path(), "run.pssession");
    let config = SessionConfig::default().with_cache_dir(cache_dir.clone());

    let first = SessionProcessor::all(config.clone())
        .unwrap()
        .process_file(&path, &default_enrichments())
        .unwrap();
    assert!(cache_dir.join("run.pssession.json").is_file());

    let second = SessionProcessor::all(config)
        .unwrap()
        .process_file(&path, &default_enrichments())
        .unwrap();

    let stats = second.stats.for_technique(Technique::Eis).unwrap();
    assert!(stats.from_cache);
    assert_eq!(
        first.get(Technique::Eis).unwrap().shape(),
        second.get(Technique::Eis).unwrap().shape()
    );
}

#[test]
fn test_without_cache_leaves_no_files() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_session(temp_dir.path(), "run.pssession");

    let tables = SessionProcessor::all(SessionConfig::default().without_cache())
        .unwrap()
        .process_file(&path, &[])
        .unwrap();
    assert!(tables.get(Technique::Eis).is_some());

    let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_info_listing_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_session(temp_dir.path(), "run.pssession");
    let config = SessionConfig::default().without_cache();

    let session = load_session(&path, &config).unwrap();
    assert_eq!(session.core_version, "5.11.1006");

    let listing = SessionProcessor::all(config).unwrap().info(&session.measurements);
    let techniques: Vec<Technique> = listing.iter().map(|i| i.technique).collect();
    assert_eq!(techniques, vec![Technique::Eis, Technique::Cv, Technique::Lsv]);
    assert_eq!(listing[1].params[1], ("scan_rate".to_string(), Value::Float(0.1)));
}
