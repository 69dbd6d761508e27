//! End-to-end extraction scenarios

use super::*;
use crate::config::SessionConfig;
use crate::enrichment::{Enrichment, Updates, default_enrichments};
use crate::models::Technique;
use crate::processor::SessionProcessor;

fn processor(techniques: Vec<Technique>) -> SessionProcessor {
    SessionProcessor::new(techniques, SessionConfig::default()).unwrap()
}

#[test]
fn test_impedance_record_with_three_parameters() {
    let record = eis_record(
        "session",
        JAN_2024,
        "Method_ID=EIS\nmin_freq=1\nmax_freq=1000",
        vec![eis_channel(
            "CH 3: 5 freqs",
            &[1.0, 10.0, 100.0, 500.0, 1000.0],
            &[9.0, 8.0, 7.0, 6.0, 5.0],
        )],
    );

    let tables = processor(vec![Technique::Eis]).process(&[record], &[]).unwrap();
    let eis = tables.get(Technique::Eis).unwrap();

    assert_eq!(eis.height(), 5);
    assert_eq!(
        names(eis),
        vec![
            "title",
            "date",
            "measurement_id",
            "channel",
            "method_id",
            "min_freq",
            "max_freq",
            "sweep_id",
            "frequency",
            "z",
        ]
    );
    assert!(column(eis, "channel").iter().all(|c| *c == Value::Int(3)));
    assert!(column(eis, "method_id").iter().all(|m| *m == Value::from("eis")));
    assert!(column(eis, "date").iter().all(|d| *d == Value::from("2024-01-01T00:00:00.000000")));
    assert_eq!(floats(eis, "frequency"), vec![1.0, 10.0, 100.0, 500.0, 1000.0]);

    let stats = tables.stats.for_technique(Technique::Eis).unwrap();
    assert_eq!(stats.records_matched, 1);
    assert_eq!(stats.records_succeeded, 1);
    assert_eq!(stats.total_rows, 5);
}

#[test]
fn test_cyclic_record_derives_direction_and_charge() {
    let record = curve_record(
        "cv session",
        JAN_2024,
        "METHOD_ID=CV\nscan_rate=0.1\nn_scans=2",
        vec![curve(
            "CV i vs E Scan 2 Channel 1",
            &[0.0, 1.0, 0.0, -1.0],
            &[1.0, 1.0, 1.0, 1.0],
        )],
    );

    let tables = processor(vec![Technique::Cv]).process(&[record], &[]).unwrap();
    let cv = tables.get(Technique::Cv).unwrap();

    assert_eq!(cv.height(), 4);
    assert_eq!(
        column(cv, "sweep_dir"),
        vec![Value::Int(1), Value::Int(1), Value::Int(-1), Value::Int(-1)]
    );
    assert_eq!(floats(cv, "q_norm"), vec![0.0, 1.0, 0.0, 1.0]);
    assert_eq!(floats(cv, "charge"), vec![0.0, 10.0, 20.0, 30.0]);
    assert!(column(cv, "channel").iter().all(|c| *c == Value::Int(1)));
    assert!(column(cv, "cycle").iter().all(|c| *c == Value::Int(2)));

    let all = names(cv);
    let position = |name: &str| all.iter().position(|n| n == name).unwrap();
    assert!(position("sweep_id") < position("voltage"));
    assert_eq!(
        &all[position("voltage")..],
        &["voltage", "current", "sweep_dir", "charge", "segment_charge", "q_norm"]
    );
}

#[test]
fn test_bottom_block_enrichment_offsets_channel() {
    let method = "method_id=lsv\nscan_rate=0.5";
    let records = vec![
        curve_record(
            "2024-01-01 R7 I2 N3 BOT",
            JAN_2024,
            method,
            vec![curve("LSV i vs E Channel 3", &[0.0, 0.5], &[1.0, 1.0])],
        ),
        curve_record(
            "2024-01-01 R7 I2 N3 TOP",
            JAN_2024 + HOUR,
            method,
            vec![curve("LSV i vs E Channel 3", &[0.0, 0.5], &[1.0, 1.0])],
        ),
    ];

    let tables = processor(vec![Technique::Lsv])
        .process(&records, &default_enrichments())
        .unwrap();
    let lsv = tables.get(Technique::Lsv).unwrap();

    assert_eq!(
        column(lsv, "channel"),
        vec![Value::Int(19), Value::Int(19), Value::Int(3), Value::Int(3)]
    );
    assert_eq!(
        column(lsv, "block"),
        vec![
            Value::from("BOT"),
            Value::from("BOT"),
            Value::from("TOP"),
            Value::from("TOP")
        ]
    );
    assert!(column(lsv, "device").iter().all(|d| *d == Value::from("N03")));
    assert_eq!(floats(lsv, "charge"), vec![0.0, 1.0, 0.0, 1.0]);
}

#[test]
fn test_merged_rows_sorted_by_date_then_channel() {
    let method = "method_id=eis";
    let records = vec![
        eis_record(
            "late",
            JAN_2024 + HOUR,
            method,
            vec![eis_channel("CH 1: 1 freqs", &[1.0], &[1.0])],
        ),
        eis_record(
            "early",
            JAN_2024,
            method,
            vec![
                eis_channel("CH 2: 1 freqs", &[1.0], &[2.0]),
                eis_channel("CH 1: 1 freqs", &[1.0], &[3.0]),
            ],
        ),
    ];

    let tables = processor(vec![Technique::Eis]).process(&records, &[]).unwrap();
    let eis = tables.get(Technique::Eis).unwrap();

    assert_eq!(
        column(eis, "title"),
        vec![Value::from("early"), Value::from("early"), Value::from("late")]
    );
    assert_eq!(floats(eis, "z"), vec![3.0, 2.0, 1.0]);
}

#[test]
fn test_sort_keeps_record_order_on_ties() {
    let method = "method_id=eis";
    let records: Vec<_> = ["first", "second", "third"]
        .iter()
        .map(|title| {
            eis_record(
                title,
                JAN_2024,
                method,
                vec![eis_channel("CH 1: 1 freqs", &[1.0], &[1.0])],
            )
        })
        .collect();

    let tables = processor(vec![Technique::Eis]).process(&records, &[]).unwrap();
    assert_eq!(
        column(tables.get(Technique::Eis).unwrap(), "title"),
        vec![Value::from("first"), Value::from("second"), Value::from("third")]
    );
}

#[test]
fn test_presort_key_takes_precedence() {
    let method = "method_id=eis";
    let records = vec![
        eis_record(
            "2024-01-01 R1 I1 N2 TOP",
            JAN_2024,
            method,
            vec![eis_channel("CH 1: 1 freqs", &[1.0], &[1.0])],
        ),
        eis_record(
            "2024-01-01 R1 I1 N1 TOP",
            JAN_2024 + HOUR,
            method,
            vec![eis_channel("CH 1: 1 freqs", &[1.0], &[2.0])],
        ),
    ];

    let config = SessionConfig::default().with_presort(vec!["device".into()]);
    let tables = SessionProcessor::new(vec![Technique::Eis], config)
        .unwrap()
        .process(&records, &default_enrichments())
        .unwrap();
    assert_eq!(
        column(tables.get(Technique::Eis).unwrap(), "device"),
        vec![Value::from("N01"), Value::from("N02")]
    );
}

#[test]
fn test_records_split_by_technique() {
    let records = vec![
        eis_record(
            "eis",
            JAN_2024,
            "method_id=eis",
            vec![eis_channel("CH 1: 1 freqs", &[1.0], &[1.0])],
        ),
        curve_record(
            "lsv",
            JAN_2024,
            "method_id=lsv\nscan_rate=1",
            vec![curve("LSV i vs E Channel 2", &[0.0, 1.0, 2.0], &[0.0, 0.0, 0.0])],
        ),
        json!({"Title": "unknown technique", "Method": "method_id=swv"}),
    ];

    let tables = SessionProcessor::all(SessionConfig::default())
        .unwrap()
        .process(&records, &[])
        .unwrap();

    assert_eq!(tables.get(Technique::Eis).unwrap().height(), 1);
    assert_eq!(tables.get(Technique::Lsv).unwrap().height(), 3);
    assert!(tables.get(Technique::Cv).is_none());
    assert_eq!(tables.stats.records_total, 3);
    assert_eq!(tables.stats.failures().count(), 0);
}

#[test]
fn test_custom_enrichment_sees_earlier_results() {
    let record = eis_record(
        "session",
        JAN_2024,
        "method_id=eis",
        vec![eis_channel("CH 4: 1 freqs", &[1.0], &[1.0])],
    );
    let enrichments = vec![
        Enrichment::for_all("tag", |_| {
            Updates::from([("site".to_string(), Value::from("left"))])
        }),
        Enrichment::new(
            "shift_left",
            |row| row.get_str("site") == Some("left"),
            |row| {
                Updates::from([(
                    "channel".to_string(),
                    Value::Int(row.get_i64("channel").unwrap() * 10),
                )])
            },
        ),
    ];

    let tables = processor(vec![Technique::Eis])
        .process(&[record], &enrichments)
        .unwrap();
    assert_eq!(
        column(tables.get(Technique::Eis).unwrap(), "channel"),
        vec![Value::Int(40)]
    );
}
