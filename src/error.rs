//! Error handling for session processing operations.
//!
//! Covers file loading, parameter-block parsing, per-technique extraction
//! and table assembly failures. Which of these abort a single line, a single
//! sub-channel or a whole record is decided by the caller, not here.

use crate::models::Technique;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Parameter line that is neither `key=value` nor `key value`
    #[error("Unparseable parameter line: {line:?}")]
    UnparseableParameterLine { line: String },

    #[error("{technique} measurement is missing required parameter '{key}'")]
    MissingRequiredParameter { technique: Technique, key: String },

    #[error("{technique} parameter '{key}' is invalid: {reason}")]
    InvalidParameter {
        technique: Technique,
        key: String,
        reason: String,
    },

    #[error("Could not parse {technique} channel title: {title:?}")]
    TitlePatternMismatch { technique: Technique, title: String },

    #[error("No channels found in {technique} measurement")]
    EmptyChannelList { technique: Technique },

    #[error("Malformed {technique} measurement: {reason}")]
    MalformedRecord { technique: Technique, reason: String },

    #[error("Invalid session file: {path} - {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    /// Transform wrote a value the existing column cannot hold
    #[error("Enrichment '{name}' cannot write column '{column}': {reason}")]
    Enrichment {
        name: String,
        column: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SessionError {
    /// Whether the error only invalidates one sub-channel of a record.
    pub fn is_channel_scoped(&self) -> bool {
        matches!(self, SessionError::TitlePatternMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
