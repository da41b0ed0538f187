//! Suffix derivation for generated identity names.
//!
//! Service accounts, custom roles, and identity pools carry a short suffix so
//! names stay unique across re-creation. The suffix must be stable for the
//! same key across runs, otherwise every run renames every role.

use super::SUFFIX_LENGTH;
use crate::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const STATE_VERSION: u32 = 1;

/// Source of per-key suffixes.
pub trait SuffixSource {
    /// Lower-case suffix of [`SUFFIX_LENGTH`] characters for `key`.
    ///
    /// Repeated calls with the same key return the same suffix.
    fn suffix_for(&mut self, key: &str) -> String;
}

/// Suffix derived from a blake3 hash of the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedSuffix;

impl SuffixSource for HashedSuffix {
    fn suffix_for(&mut self, key: &str) -> String {
        let hash = blake3::hash(key.as_bytes()).to_hex();
        hash[..SUFFIX_LENGTH].to_string()
    }
}

#[derive(Debug, Error)]
pub enum SuffixStateError {
    #[error("failed to read suffix state {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse suffix state {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write suffix state {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported suffix state version {found} in {path}")]
    Version { path: PathBuf, found: u32 },
    #[error("stored suffix '{suffix}' for {key} is not 8 lower-case alphanumerics")]
    Invalid { key: String, suffix: String },
}

impl SuffixStateError {
    pub const fn error_code(&self) -> ErrorCode {
        ErrorCode::SuffixStateError
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    suffixes: BTreeMap<String, String>,
}

/// Previously assigned suffixes, with fresh generation for unknown keys.
///
/// Fresh suffixes are random; persist the store with [`SuffixStore::save`]
/// so the next run reuses them.
#[derive(Debug, Clone, Default)]
pub struct SuffixStore {
    suffixes: BTreeMap<String, String>,
    fresh: BTreeSet<String>,
}

impl SuffixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a state file; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, SuffixStateError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no suffix state yet");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(SuffixStateError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let state =
            serde_json::from_str::<StateFile>(&contents).map_err(|source| {
                SuffixStateError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        if state.version != STATE_VERSION {
            return Err(SuffixStateError::Version {
                path: path.to_path_buf(),
                found: state.version,
            });
        }

        let mut store = Self::new();
        for (key, suffix) in state.suffixes {
            store.insert(key, suffix)?;
        }
        debug!(path = %path.display(), suffixes = store.len(), "loaded suffix state");
        Ok(store)
    }

    /// Write the store as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), SuffixStateError> {
        let write_error = |source| SuffixStateError::Write {
            path: path.to_path_buf(),
            source,
        };
        let state = StateFile {
            version: STATE_VERSION,
            suffixes: self.suffixes.clone(),
        };
        let mut json = serde_json::to_string_pretty(&state).map_err(|source| {
            SuffixStateError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        json.push('\n');

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(write_error)?;
        fs::rename(&tmp, path).map_err(write_error)?;
        Ok(())
    }

    /// Record a known suffix.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Result<(), SuffixStateError> {
        let key = key.into();
        let suffix = suffix.into();
        let valid = suffix.len() == SUFFIX_LENGTH
            && suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !valid {
            return Err(SuffixStateError::Invalid { key, suffix });
        }
        self.suffixes.insert(key, suffix);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.suffixes.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Keys that received a newly generated suffix during this run.
    pub fn fresh_keys(&self) -> impl Iterator<Item = &str> {
        self.fresh.iter().map(String::as_str)
    }

    /// True when the store gained suffixes that are not yet saved.
    pub fn is_dirty(&self) -> bool {
        !self.fresh.is_empty()
    }
}

impl SuffixSource for SuffixStore {
    fn suffix_for(&mut self, key: &str) -> String {
        if let Some(existing) = self.suffixes.get(key) {
            return existing.clone();
        }
        let suffix = uuid::Uuid::new_v4().simple().to_string()[..SUFFIX_LENGTH].to_string();
        debug!(key, %suffix, "assigned fresh suffix");
        self.suffixes.insert(key.to_string(), suffix.clone());
        self.fresh.insert(key.to_string());
        suffix
    }
}
