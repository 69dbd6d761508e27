//! Session file loading
//!
//! `.pssession` exports are UTF-16 text holding one JSON document, often
//! followed by trailing bytes that are not JSON. The loader recovers the
//! text encoding, parses the first JSON value, checks the instrument
//! software version and keeps a plain JSON copy next to the file (or in the
//! cache directory) so later loads skip the decoding work.

use crate::config::SessionConfig;
use crate::constants::{JSON_CACHE_SUFFIX, SUPPORTED_CORE_VERSION};
use crate::error::{Result, SessionError};
use crate::models::Session;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loads session files with an optional parsed-JSON cache
#[derive(Debug, Clone, Default)]
pub struct SessionLoader {
    cache_dir: Option<PathBuf>,
    read_cache: bool,
    write_cache: bool,
    strict_version: bool,
}

impl SessionLoader {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            read_cache: config.read_cache,
            write_cache: config.write_cache,
            strict_version: config.strict_version,
        }
    }

    /// Where the parsed JSON of `path` is cached
    pub fn json_cache_path(&self, path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(format!("{}{}", file_name, JSON_CACHE_SUFFIX))
    }

    pub fn load(&self, path: &Path) -> Result<Session> {
        let cache_path = self.json_cache_path(path);

        if self.read_cache && cache_path.is_file() {
            match read_cached_json(&cache_path) {
                Ok(session) => {
                    info!("Loaded parsed session from cache {}", cache_path.display());
                    return Ok(session);
                }
                Err(e) => warn!(
                    "Ignoring unreadable session cache {}: {}",
                    cache_path.display(),
                    e
                ),
            }
        }

        let bytes = fs::read(path)?;
        let text = decode_text(&bytes).map_err(|reason| SessionError::InvalidFormat {
            path: path.to_path_buf(),
            reason,
        })?;
        let document = first_json_value(&text).map_err(|reason| SessionError::InvalidFormat {
            path: path.to_path_buf(),
            reason,
        })?;
        let session = Session::deserialize(&document)?;

        if let Err(reason) = check_version(&session.core_version) {
            if self.strict_version {
                return Err(SessionError::InvalidFormat {
                    path: path.to_path_buf(),
                    reason,
                });
            }
            warn!("Support check failed for {}: {}", path.display(), reason);
        }

        debug!(
            "Parsed {} with {} measurement record(s)",
            path.display(),
            session.measurements.len()
        );

        if self.write_cache {
            if let Err(e) = write_cached_json(&cache_path, &document) {
                warn!("Could not cache parsed session at {}: {}", cache_path.display(), e);
            }
        }

        Ok(session)
    }
}

/// Load a session file with the cache settings of `config`
pub fn load_session(path: &Path, config: &SessionConfig) -> Result<Session> {
    SessionLoader::new(config).load(path)
}

fn read_cached_json(path: &Path) -> Result<Session> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_cached_json(path: &Path, document: &serde_json::Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string(document)?)?;
    Ok(())
}

/// Decode UTF-16 (either byte order) or UTF-8 text, dropping any byte-order mark
pub fn decode_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let text = match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes)?,
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes)?,
        [0xEF, 0xBB, 0xBF, rest @ ..] => utf8(rest)?,
        // ASCII-range text encoded as UTF-16LE without a mark
        [first, 0x00, ..] if *first != 0 => decode_utf16(bytes, u16::from_le_bytes)?,
        _ => utf8(bytes)?,
    };
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn utf8(bytes: &[u8]) -> std::result::Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("not valid UTF-8 or UTF-16: {}", e))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> std::result::Result<String, String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| format!("invalid UTF-16 text: {}", e))
}

/// Parse the first JSON value of `text`, ignoring whatever follows it
pub fn first_json_value(text: &str) -> std::result::Result<serde_json::Value, String> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| "no JSON document found".to_string())?
        .map_err(|e| format!("could not parse JSON document: {}", e))
}

/// Reject core versions newer than the supported one
pub fn check_version(version: &str) -> std::result::Result<(), String> {
    let mut parts = version.trim().split('.');
    let parse = |part: Option<&str>| part.and_then(|p| p.trim().parse::<u32>().ok());
    let (Some(major), Some(minor)) = (parse(parts.next()), parse(parts.next())) else {
        return Err(format!("could not parse version string {:?}", version));
    };

    let (supported_major, supported_minor, supported_build) = SUPPORTED_CORE_VERSION;
    if major > supported_major || minor > supported_minor {
        return Err(format!(
            "version {} is newer than supported {}.{}.{}",
            version, supported_major, supported_minor, supported_build
        ));
    }
    Ok(())
}
