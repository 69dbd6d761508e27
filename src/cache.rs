//! Per-technique table cache
//!
//! Merged tables are memoised per session file and technique. The cache has
//! no invalidation beyond file identity: a stale entry is served until the
//! caller forces a reload or deletes it.

use crate::constants::columns;
use crate::error::Result;
use crate::models::Technique;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Read-through/write-through store for merged technique tables
pub trait TableCache {
    /// Cached table for `technique`, or `None` when nothing is stored
    fn read(&self, technique: Technique) -> Result<Option<DataFrame>>;

    /// Store the merged table for `technique`
    fn write(&self, technique: Technique, table: &DataFrame) -> Result<()>;
}

/// CSV files named `<prefix>_<TECHNIQUE>.csv` in one directory
#[derive(Debug, Clone)]
pub struct CsvTableCache {
    dir: PathBuf,
    prefix: String,
}

impl CsvTableCache {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Cache for one session file, in `cache_dir` or next to the file
    pub fn for_session(session_path: &Path, cache_dir: Option<&Path>) -> Self {
        let prefix = session_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string());
        let dir = match cache_dir {
            Some(dir) => dir.to_path_buf(),
            None => session_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        Self::new(dir, prefix)
    }

    pub fn path_for(&self, technique: Technique) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", self.prefix, technique.label()))
    }
}

impl TableCache for CsvTableCache {
    fn read(&self, technique: Technique) -> Result<Option<DataFrame>> {
        let path = self.path_for(technique);
        if !path.is_file() {
            debug!("No cached {} table at {}", technique, path.display());
            return Ok(None);
        }

        let table = CsvReadOptions::default()
            .with_has_header(true)
            .with_schema_overwrite(Some(Arc::new(text_overrides(&path)?)))
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?;
        debug!(
            "Loaded cached {} table ({} rows) from {}",
            technique,
            table.height(),
            path.display()
        );
        Ok(Some(table))
    }

    fn write(&self, technique: Technique, table: &DataFrame) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(technique);
        let mut file = File::create(&path)?;
        let mut table = table.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut table)?;
        debug!("Cached {} table at {}", technique, path.display());
        Ok(())
    }
}

/// String dtype for every text column present in the CSV header.
///
/// Ids such as `00012345` or `1e5` would otherwise be inferred as numbers.
fn text_overrides(path: &Path) -> Result<Schema> {
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;

    let mut schema = Schema::with_capacity(columns::TEXT.len());
    for name in header.trim_end().split(',').map(|n| n.trim_matches('"')) {
        if columns::TEXT.contains(&name) {
            schema.with_column(name.into(), DataType::String);
        }
    }
    Ok(schema)
}
