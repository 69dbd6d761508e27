//! Configuration management and validation.
//!
//! Provides the sort options, per-technique title policies and cache
//! settings used by the session processor.

use crate::constants::PRESORT_ENV_VAR;
use crate::error::{Result, SessionError};
use crate::models::Technique;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// What a sub-channel whose title does not match its technique's pattern becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TitlePolicy {
    /// Drop the sub-channel; the rest of the record still succeeds
    SkipChannel,
    /// Keep the sub-channel with no channel/cycle discriminators
    EmptyDiscriminators,
}

/// Caller-supplied sort keys around the technique defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Keys sorted on before the technique defaults
    pub presort: Vec<String>,

    /// Keys sorted on after the technique defaults
    pub sort: Vec<String>,
}

impl SortOptions {
    /// Full key precedence for a technique: presort, defaults, trailing keys
    pub fn keys_for(&self, technique: Technique) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let defaults = technique.sort_keys().iter().map(|k| k.to_string());
        for key in self.presort.iter().cloned().chain(defaults).chain(self.sort.iter().cloned()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Global configuration for session processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sort keys around the technique defaults
    pub sort: SortOptions,

    /// Title-mismatch handling per technique
    pub title_policies: HashMap<Technique, TitlePolicy>,

    /// Directory for parsed JSON and per-technique table caches (None = next to the input)
    pub cache_dir: Option<PathBuf>,

    /// Serve tables and parsed JSON from cache when present
    pub read_cache: bool,

    /// Store tables and parsed JSON after processing
    pub write_cache: bool,

    /// Treat an unsupported core version as an error instead of a warning
    pub strict_version: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let title_policies = Technique::ALL
            .into_iter()
            .map(|t| (t, TitlePolicy::SkipChannel))
            .collect();

        Self {
            sort: SortOptions::default(),
            title_policies,
            cache_dir: None,
            read_cache: true,
            write_cache: true,
            strict_version: false,
        }
    }
}

impl SessionConfig {
    /// Default configuration with pre-sort keys taken from `PSESS_PRESORT`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(PRESORT_ENV_VAR) {
            config.sort.presort = parse_key_list(&raw);
            debug!("Pre-sort keys from {}: {:?}", PRESORT_ENV_VAR, config.sort.presort);
        }
        config
    }

    pub fn title_policy(&self, technique: Technique) -> TitlePolicy {
        self.title_policies
            .get(&technique)
            .copied()
            .unwrap_or(TitlePolicy::SkipChannel)
    }

    pub fn with_title_policy(mut self, technique: Technique, policy: TitlePolicy) -> Self {
        self.title_policies.insert(technique, policy);
        self
    }

    pub fn with_presort(mut self, keys: Vec<String>) -> Self {
        self.sort.presort = keys;
        self
    }

    pub fn with_sort(mut self, keys: Vec<String>) -> Self {
        self.sort.sort = keys;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Ignore cached data but still refresh the cache
    pub fn with_force_reload(mut self) -> Self {
        self.read_cache = false;
        self
    }

    /// Neither read nor write any cache
    pub fn without_cache(mut self) -> Self {
        self.read_cache = false;
        self.write_cache = false;
        self
    }

    pub fn with_strict_version(mut self) -> Self {
        self.strict_version = true;
        self
    }

    /// Reject sort keys that could never name a column
    pub fn validate(&self) -> Result<()> {
        for key in self.sort.presort.iter().chain(self.sort.sort.iter()) {
            if key.trim().is_empty() {
                return Err(SessionError::Configuration {
                    message: "sort keys must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
