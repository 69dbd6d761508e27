//! Session processing orchestrator.
//!
//! Drives every configured technique over the raw records of a session:
//! match, extract, merge, enrich and sort. A failing record is logged and
//! counted but never stops the run; a technique with no successful record
//! yields no table at all.

#[cfg(test)]
pub mod tests;

use crate::cache::{CsvTableCache, TableCache};
use crate::config::SessionConfig;
use crate::constants::{METHOD_ID_KEY, columns};
use crate::enrichment::{Enrichment, apply_enrichments};
use crate::error::Result;
use crate::extract::{common::common_entries, extract};
use crate::loader::SessionLoader;
use crate::merge::{concat_tables, sort_table};
use crate::method::{KeySelection, MethodParams, match_technique, parse_method_block};
use crate::models::{
    Measurement, MeasurementInfo, ProcessingStats, RecordFailure, Technique, TechniqueStats, Value,
};
use colored::*;
use polars::prelude::DataFrame;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Merged tables of one session, keyed by technique
#[derive(Debug, Clone, Default)]
pub struct SessionTables {
    tables: Vec<(Technique, DataFrame)>,
    pub stats: ProcessingStats,
}

impl SessionTables {
    /// Table for `technique`, or `None` when no record of it was extracted
    pub fn get(&self, technique: Technique) -> Option<&DataFrame> {
        self.tables
            .iter()
            .find(|(t, _)| *t == technique)
            .map(|(_, table)| table)
    }

    pub fn take(&mut self, technique: Technique) -> Option<DataFrame> {
        let position = self.tables.iter().position(|(t, _)| *t == technique)?;
        Some(self.tables.remove(position).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Technique, &DataFrame)> {
        self.tables.iter().map(|(t, table)| (*t, table))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// One line per technique, for console output
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (technique, stats) in &self.stats.techniques {
            let line = match self.get(*technique) {
                Some(table) => format!(
                    "{}: {} rows x {} columns from {} record(s){}",
                    technique.label().green().bold(),
                    table.height(),
                    table.width(),
                    stats.records_succeeded,
                    if stats.from_cache { " (cached)" } else { "" }
                ),
                None => format!("{}: {}", technique.label().dimmed(), "no measurements".dimmed()),
            };
            lines.push(line);
            if stats.records_failed > 0 {
                lines.push(format!(
                    "  {} {} record(s) skipped",
                    "⚠".yellow(),
                    stats.records_failed
                ));
            }
        }
        if !self.stats.records_undecodable.is_empty() {
            lines.push(format!(
                "{} {} record(s) could not be decoded",
                "⚠".yellow(),
                self.stats.records_undecodable.len()
            ));
        }
        lines.join("\n")
    }
}

/// A decoded record with its parsed parameter block
struct DecodedRecord {
    index: usize,
    measurement: Measurement,
    params: MethodParams,
}

/// Orchestrates extraction for an explicit list of techniques
pub struct SessionProcessor {
    techniques: Vec<Technique>,
    config: SessionConfig,
    cache: Option<Box<dyn TableCache>>,
}

impl fmt::Debug for SessionProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProcessor")
            .field("techniques", &self.techniques)
            .field("config", &self.config)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl SessionProcessor {
    /// Create a processor for `techniques`, validating the configuration
    pub fn new(techniques: Vec<Technique>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            techniques,
            config,
            cache: None,
        })
    }

    /// Processor for every supported technique
    pub fn all(config: SessionConfig) -> Result<Self> {
        Self::new(Technique::ALL.to_vec(), config)
    }

    pub fn with_cache(mut self, cache: impl TableCache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Load a session file and process it, using the CSV table cache
    /// unless caching is disabled
    pub fn process_file(
        mut self,
        path: &Path,
        enrichments: &[Enrichment],
    ) -> Result<SessionTables> {
        let session = SessionLoader::new(&self.config).load(path)?;
        if self.cache.is_none() && (self.config.read_cache || self.config.write_cache) {
            let cache = CsvTableCache::for_session(path, self.config.cache_dir.as_deref());
            self = self.with_cache(cache);
        }
        self.process(&session.measurements, enrichments)
    }

    /// Run every technique over `records`
    pub fn process(
        &self,
        records: &[serde_json::Value],
        enrichments: &[Enrichment],
    ) -> Result<SessionTables> {
        let start_time = Instant::now();
        let mut result = SessionTables::default();
        result.stats.records_total = records.len();

        let decoded = self.decode(records, &mut result.stats.records_undecodable);

        for &technique in &self.techniques {
            let (table, stats) = self.process_technique(technique, &decoded, enrichments)?;
            info!(
                "{}: {} of {} matched record(s) extracted, {} rows",
                technique, stats.records_succeeded, stats.records_matched, stats.total_rows
            );
            if let Some(table) = table {
                result.tables.push((technique, table));
            }
            result.stats.techniques.push((technique, stats));
        }

        debug!(
            "Processed {} record(s) in {:.2?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(result)
    }

    fn decode(
        &self,
        records: &[serde_json::Value],
        failures: &mut Vec<RecordFailure>,
    ) -> Vec<DecodedRecord> {
        let mut decoded = Vec::with_capacity(records.len());
        for (index, raw) in records.iter().enumerate() {
            match Measurement::from_value(raw) {
                Ok(measurement) => {
                    let params = parse_method_block(&measurement.method);
                    decoded.push(DecodedRecord {
                        index,
                        measurement,
                        params,
                    });
                }
                Err(e) => {
                    warn!("Skipping record {}: cannot decode measurement: {}", index, e);
                    failures.push(RecordFailure {
                        index,
                        technique: None,
                        message: e.to_string(),
                    });
                }
            }
        }
        decoded
    }

    fn process_technique(
        &self,
        technique: Technique,
        records: &[DecodedRecord],
        enrichments: &[Enrichment],
    ) -> Result<(Option<DataFrame>, TechniqueStats)> {
        let mut stats = TechniqueStats::default();

        if let Some(cached) = self.read_cached(technique) {
            stats.from_cache = true;
            stats.total_rows = cached.height();
            return Ok((Some(cached), stats));
        }

        let policy = self.config.title_policy(technique);
        let mut tables = Vec::new();

        for record in records {
            let Some(params) = match_technique(
                &record.params,
                technique.method_id(),
                KeySelection::Only(technique.method_keys()),
            ) else {
                continue;
            };
            stats.records_matched += 1;

            match extract(technique, &record.measurement, &params, policy) {
                Ok(extracted) => {
                    stats.records_succeeded += 1;
                    stats.channels_skipped += extracted.channels_skipped;
                    tables.push(extracted.table);
                }
                Err(e) => {
                    warn!(
                        "Skipping record {} ({}) '{}': {}",
                        record.index, technique, record.measurement.title, e
                    );
                    stats.records_failed += 1;
                    stats.failures.push(RecordFailure {
                        index: record.index,
                        technique: Some(technique),
                        message: e.to_string(),
                    });
                }
            }
        }

        if tables.is_empty() {
            debug!("No {} table produced", technique);
            return Ok((None, stats));
        }

        let merged = concat_tables(tables)?;
        let enriched = apply_enrichments(merged, enrichments)?;
        let keys = self.config.sort.keys_for(technique);
        let table = sort_table(technique, enriched, &keys)?;
        stats.total_rows = table.height();

        self.write_cached(technique, &table);
        Ok((Some(table), stats))
    }

    fn read_cached(&self, technique: Technique) -> Option<DataFrame> {
        let cache = self.cache.as_ref().filter(|_| self.config.read_cache)?;
        match cache.read(technique) {
            Ok(table) => table,
            Err(e) => {
                warn!("Ignoring {} table cache: {}", technique, e);
                None
            }
        }
    }

    fn write_cached(&self, technique: Technique, table: &DataFrame) {
        let Some(cache) = self.cache.as_ref().filter(|_| self.config.write_cache) else {
            return;
        };
        if let Err(e) = cache.write(technique, table) {
            warn!("Could not cache {} table: {}", technique, e);
        }
    }

    /// Listing of every record the configured techniques recognise.
    ///
    /// A record is listed under the first technique that matches it.
    pub fn info(&self, records: &[serde_json::Value]) -> Vec<MeasurementInfo> {
        let mut listing = Vec::new();
        let decoded = self.decode(records, &mut Vec::new());

        for record in &decoded {
            let found = self.techniques.iter().find_map(|&technique| {
                match_technique(
                    &record.params,
                    technique.method_id(),
                    KeySelection::Only(technique.info_keys()),
                )
                .map(|params| (technique, params))
            });
            let Some((technique, params)) = found else {
                continue;
            };

            let common = match common_entries(&record.measurement) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot list record {}: {}", record.index, e);
                    continue;
                }
            };
            let text = |key: &str| {
                common
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default()
            };

            let mut entries: Vec<(String, Value)> =
                params.to_entries(KeySelection::Only(&[METHOD_ID_KEY]));
            entries.extend(params.to_entries(KeySelection::Only(technique.info_keys())));

            listing.push(MeasurementInfo {
                index: record.index,
                technique,
                title: text(columns::TITLE),
                date: text(columns::DATE),
                measurement_id: text(columns::MEASUREMENT_ID),
                params: entries,
            });
        }

        listing
    }
}
