//! PalmSens session processor library
//!
//! Converts PalmSens `.pssession` exports into normalized tables, one per
//! measurement technique: electrochemical impedance spectroscopy (EIS),
//! cyclic voltammetry (CV) and linear sweep voltammetry (LSV).
//!
//! This library provides tools for:
//! - Loading session files with UTF-16 recovery and a parsed-JSON cache
//! - Parsing free-text method parameter blocks and matching records to techniques
//! - Extracting per-channel tables with broadcast metadata and stable sweep ids
//! - Deriving sweep direction and integrated charge for voltammetry sweeps
//! - Row-level enrichment, merging and deterministic sorting
//! - Per-technique table caching
//!
//! # Example
//!
//! ```no_run
//! use pssession_processor::{SessionConfig, SessionProcessor, Technique, default_enrichments};
//! use std::path::Path;
//!
//! # fn main() -> pssession_processor::Result<()> {
//! let tables = SessionProcessor::all(SessionConfig::from_env())?
//!     .process_file(Path::new("run.pssession"), &default_enrichments())?;
//!
//! if let Some(eis) = tables.get(Technique::Eis) {
//!     println!("{}", eis.head(Some(5)));
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod enrichment;
pub mod error;
pub mod extract;
pub mod features;
pub mod loader;
pub mod merge;
pub mod method;
pub mod models;
pub mod processor;
pub mod table;

// Re-export commonly used types
pub use cache::{CsvTableCache, TableCache};
pub use config::{SessionConfig, SortOptions, TitlePolicy};
pub use enrichment::{Enrichment, Updates, apply_enrichments, default_enrichments};
pub use error::{Result, SessionError};
pub use loader::{SessionLoader, load_session};
pub use method::{KeySelection, MethodParams, match_technique, parse_method_block};
pub use models::{MeasurementInfo, ProcessingStats, RecordFailure, Session, Technique, Value};
pub use processor::{SessionProcessor, SessionTables};
pub use table::Row;
