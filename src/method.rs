//! Method parameter blocks and technique matching.
//!
//! Each record carries a free-text block of `key=value` (or `key value`)
//! lines describing the instrument settings. The block is parsed into a
//! [`MethodParams`] mapping, which then decides the technique of the record
//! and supplies the parameter columns of its tables.

use crate::constants::{COMMENT_MARKER, METHOD_ID_KEY};
use crate::error::SessionError;
use crate::models::{Param, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Parsed parameter block: lower-cased key to scalar or repeated values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodParams {
    entries: BTreeMap<String, Param>,
}

/// Which parameter keys a match projects
#[derive(Debug, Clone, Copy)]
pub enum KeySelection<'a> {
    All,
    Only(&'a [&'a str]),
}

impl MethodParams {
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        match self.entries.entry(key.into()) {
            std::collections::btree_map::Entry::Occupied(mut slot) => slot.get_mut().push(value),
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(Param::Scalar(value));
            }
        }
    }

    /// Technique id of the block, if any
    pub fn method_id(&self) -> Option<String> {
        self.get(METHOD_ID_KEY)
            .map(|p| p.to_value().to_string().to_lowercase())
    }

    /// Numeric scalar parameter
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Param::as_scalar).and_then(Value::as_f64)
    }

    /// Parameters as metadata entries, in `keys` order when given
    pub fn to_entries(&self, keys: KeySelection<'_>) -> Vec<(String, Value)> {
        match keys {
            KeySelection::All => self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
            KeySelection::Only(keys) => keys
                .iter()
                .filter_map(|k| self.entries.get(*k).map(|v| (k.to_string(), v.to_value())))
                .collect(),
        }
    }
}

/// Parse a parameter block, dropping lines that match neither line shape
pub fn parse_method_block(text: &str) -> MethodParams {
    let (params, skipped) = parse_method_lines(text);
    for error in &skipped {
        debug!("Skipping parameter line: {}", error);
    }
    params
}

/// Parse a parameter block and report every skipped line
pub fn parse_method_lines(text: &str) -> (MethodParams, Vec<SessionError>) {
    let mut params = MethodParams::default();
    let mut skipped = Vec::new();

    let lowered = text.to_lowercase();
    for raw in lowered.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }

        let split = match line.split_once('=') {
            Some(pair) => Some(pair),
            None => line.split_once(char::is_whitespace),
        };

        let Some((key, value)) = split else {
            skipped.push(SessionError::UnparseableParameterLine {
                line: line.to_string(),
            });
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            skipped.push(SessionError::UnparseableParameterLine {
                line: line.to_string(),
            });
            continue;
        }

        params.insert(key, coerce_value(value.trim()));
    }

    (params, skipped)
}

/// Coerce raw text to bool, then integer, then float, else keep it as text
pub fn coerce_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(raw.to_string())
}

/// Project `params` for `method_id`, or `None` when the record is another technique.
///
/// The technique-id key is always present and lower-cased in the result.
pub fn match_technique(
    params: &MethodParams,
    method_id: &str,
    selection: KeySelection<'_>,
) -> Option<MethodParams> {
    let found = params.method_id()?;
    if !found.eq_ignore_ascii_case(method_id) {
        return None;
    }

    let mut projected = MethodParams::default();
    let keep = |key: &str| match selection {
        KeySelection::All => true,
        KeySelection::Only(keys) => keys.contains(&key),
    };
    for (key, value) in &params.entries {
        if key != METHOD_ID_KEY && keep(key) {
            projected.entries.insert(key.clone(), value.clone());
        }
    }
    projected
        .entries
        .insert(METHOD_ID_KEY.to_string(), Param::Scalar(Value::Text(found)));

    Some(projected)
}
