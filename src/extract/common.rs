//! Helpers shared by every technique extractor.

use crate::config::TitlePolicy;
use crate::constants::{TICKS_PER_MICROSECOND, columns};
use crate::error::{Result, SessionError};
use crate::models::{Curve, Measurement, Technique, Value};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Number of digest bytes kept in a short id
const SHORT_ID_BYTES: usize = 4;

static EIS_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CH (\d+): (\d+) freqs").expect("valid EIS title pattern"));

static CV_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CV i vs E Scan (\d+) Channel (\d+)").expect("valid CV title pattern")
});

static LSV_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^LSV i vs E Channel (\d+)").expect("valid LSV title pattern"));

/// Convert 100 ns ticks since 0001-01-01 into a naive timestamp
pub fn ticks_to_date(ticks: i64) -> NaiveDateTime {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    epoch
        .checked_add_signed(Duration::microseconds(ticks / TICKS_PER_MICROSECOND))
        .unwrap_or(epoch)
}

/// ISO-8601 text with fixed microsecond precision, so lexical order is chronological
pub fn format_date(date: NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Stable 8-hex-digit id of any serialisable value.
///
/// Maps are hashed through `serde_json::Value`, whose objects keep their keys
/// sorted, so key insertion order never changes the id.
pub fn short_id<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = serde_json::to_value(value)?;
    let text = match canonical {
        serde_json::Value::String(s) => s,
        other => serde_json::to_string(&other)?,
    };
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    Ok(digest[..SHORT_ID_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Title, date and record id shared by every channel of a record
pub fn common_entries(measurement: &Measurement) -> Result<Vec<(String, Value)>> {
    let title = measurement.title.clone();
    let date = format_date(ticks_to_date(measurement.time_stamp));
    let measurement_id = short_id(&[title.as_str(), date.as_str()])?;

    Ok(vec![
        (columns::TITLE.to_string(), Value::Text(title)),
        (columns::DATE.to_string(), Value::Text(date)),
        (columns::MEASUREMENT_ID.to_string(), Value::Text(measurement_id)),
    ])
}

/// Ordered metadata of one sweep; its sweep id is computed on `finish`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMetadata {
    entries: Vec<(String, Value)>,
}

impl ChannelMetadata {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        let mut metadata = Self::default();
        metadata.extend(entries);
        metadata
    }

    /// Set a value, keeping the original position of an existing key
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Hash of every entry except the sweep id itself
    pub fn sweep_id(&self) -> Result<String> {
        let content: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .filter(|(k, _)| k != columns::SWEEP_ID)
            .map(|(k, v)| -> Result<(String, serde_json::Value)> {
                Ok((k.clone(), serde_json::to_value(v)?))
            })
            .collect::<Result<_>>()?;
        short_id(&content)
    }

    /// Append (or refresh) the sweep id; must be the last metadata change
    pub fn finish(mut self) -> Result<Self> {
        let sweep_id = self.sweep_id()?;
        self.entries.retain(|(k, _)| k != columns::SWEEP_ID);
        self.entries
            .push((columns::SWEEP_ID.to_string(), Value::Text(sweep_id)));
        Ok(self)
    }
}

/// Voltage (x axis) and current (y axis) samples of a voltammetry curve
pub fn curve_signals(
    technique: Technique,
    curve: &Curve,
) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>)> {
    let voltage = curve.x_axis_data_array.values();
    let current = curve.y_axis_data_array.values();
    if voltage.len() != current.len() {
        return Err(SessionError::MalformedRecord {
            technique,
            reason: format!(
                "curve {:?} has {} voltage and {} current samples",
                curve.title,
                voltage.len(),
                current.len()
            ),
        });
    }
    Ok((voltage, current))
}

/// Samples for numeric derivation; a missing sample becomes NaN
pub fn dense(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

fn capture_int(captures: &regex::Captures<'_>, group: usize) -> Option<i64> {
    captures.get(group).and_then(|m| m.as_str().parse().ok())
}

/// Channel/cycle discriminators encoded in a sub-channel title
pub fn parse_channel_title(technique: Technique, title: &str) -> Result<Vec<(String, Value)>> {
    let mismatch = || SessionError::TitlePatternMismatch {
        technique,
        title: title.to_string(),
    };

    let entries = match technique {
        Technique::Eis => {
            let caps = EIS_TITLE.captures(title).ok_or_else(mismatch)?;
            vec![(columns::CHANNEL, capture_int(&caps, 1).ok_or_else(mismatch)?)]
        }
        Technique::Cv => {
            let caps = CV_TITLE.captures(title).ok_or_else(mismatch)?;
            vec![
                (columns::CHANNEL, capture_int(&caps, 2).ok_or_else(mismatch)?),
                (columns::CYCLE, capture_int(&caps, 1).ok_or_else(mismatch)?),
            ]
        }
        Technique::Lsv => {
            let caps = LSV_TITLE.captures(title).ok_or_else(mismatch)?;
            vec![(columns::CHANNEL, capture_int(&caps, 1).ok_or_else(mismatch)?)]
        }
    };

    Ok(entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::Int(v)))
        .collect())
}

/// Apply the technique's title policy to a sub-channel title.
///
/// Under [`TitlePolicy::SkipChannel`] a mismatch is returned as an error the
/// caller uses to drop just this sub-channel.
pub fn channel_discriminators(
    technique: Technique,
    title: &str,
    policy: TitlePolicy,
) -> Result<Vec<(String, Value)>> {
    match parse_channel_title(technique, title) {
        Ok(entries) => Ok(entries),
        Err(e) if e.is_channel_scoped() && policy == TitlePolicy::EmptyDiscriminators => {
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_date() {
        assert_eq!(format_date(ticks_to_date(0)), "0001-01-01T00:00:00.000000");
        // One day and 1.5 seconds
        let ticks = (86_400 * 1_000_000 + 1_500_000) * TICKS_PER_MICROSECOND;
        assert_eq!(format_date(ticks_to_date(ticks)), "0001-01-02T00:00:01.500000");
    }

    #[test]
    fn test_short_id_is_stable_and_short() {
        let a = short_id("hello").unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(a, short_id("hello").unwrap());
        assert_ne!(a, short_id("hello!").unwrap());
    }

    #[test]
    fn test_sweep_id_ignores_key_order() {
        let a = ChannelMetadata::new(vec![
            ("title".into(), Value::from("t")),
            ("channel".into(), Value::Int(3)),
        ]);
        let b = ChannelMetadata::new(vec![
            ("channel".into(), Value::Int(3)),
            ("title".into(), Value::from("t")),
        ]);
        assert_eq!(a.sweep_id().unwrap(), b.sweep_id().unwrap());

        let c = ChannelMetadata::new(vec![
            ("channel".into(), Value::Int(4)),
            ("title".into(), Value::from("t")),
        ]);
        assert_ne!(a.sweep_id().unwrap(), c.sweep_id().unwrap());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let metadata = ChannelMetadata::new(vec![("channel".into(), Value::Int(1))])
            .finish()
            .unwrap();
        let again = metadata.clone().finish().unwrap();
        assert_eq!(metadata, again);
        assert_eq!(metadata.keys().last(), Some(columns::SWEEP_ID));
    }

    #[test]
    fn test_title_patterns() {
        let eis = parse_channel_title(Technique::Eis, "CH 3: 5 freqs").unwrap();
        assert_eq!(eis, vec![("channel".to_string(), Value::Int(3))]);

        let cv = parse_channel_title(Technique::Cv, "CV i vs E Scan 2 Channel 1").unwrap();
        assert_eq!(
            cv,
            vec![
                ("channel".to_string(), Value::Int(1)),
                ("cycle".to_string(), Value::Int(2)),
            ]
        );

        let lsv = parse_channel_title(Technique::Lsv, "LSV i vs E Channel 12").unwrap();
        assert_eq!(lsv, vec![("channel".to_string(), Value::Int(12))]);
    }

    #[test]
    fn test_title_patterns_are_case_sensitive_and_anchored() {
        assert!(parse_channel_title(Technique::Eis, "ch 3: 5 freqs").is_err());
        assert!(parse_channel_title(Technique::Eis, "x CH 3: 5 freqs").is_err());
        assert!(parse_channel_title(Technique::Lsv, "").is_err());
    }

    #[test]
    fn test_title_policy() {
        let skipped = channel_discriminators(Technique::Eis, "bad", TitlePolicy::SkipChannel);
        assert!(matches!(skipped, Err(SessionError::TitlePatternMismatch { .. })));

        let empty =
            channel_discriminators(Technique::Eis, "bad", TitlePolicy::EmptyDiscriminators)
                .unwrap();
        assert!(empty.is_empty());
    }
}
