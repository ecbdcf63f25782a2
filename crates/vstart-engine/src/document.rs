//! Read-only access to per-instance JSON configuration documents.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigDocumentError {
    /// The file could not be read.
    #[error("failed to read config document '{path}': {source}")]
    Read {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid JSON.
    #[error("invalid JSON in config document '{path}': {source}")]
    Parse {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A required key is absent or has the wrong type.
    #[error("config document '{path}' has no usable '{key}'")]
    MissingKey {
        /// Document path.
        path: Utf8PathBuf,
        /// Dotted key path.
        key: &'static str,
    },
}

/// A parsed service configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    path: Utf8PathBuf,
    root: Value,
}

impl ConfigDocument {
    /// Reads and parses the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigDocumentError::Read`] or [`ConfigDocumentError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigDocumentError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigDocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root = serde_json::from_str(&text).map_err(|source| ConfigDocumentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            root,
        })
    }

    /// Listen address suffix, e.g. `:9500`, appended to `http://127.0.0.1`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigDocumentError::MissingKey`] when `bind_addr` is not a
    /// string.
    pub fn bind_addr(&self) -> Result<&str, ConfigDocumentError> {
        self.root
            .get("bind_addr")
            .and_then(Value::as_str)
            .ok_or_else(|| self.missing("bind_addr"))
    }

    /// Blobnode data directories from `disks[].path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigDocumentError::MissingKey`] when `disks` is not an array
    /// or an entry lacks a string `path`.
    pub fn blobnode_disks(&self) -> Result<Vec<Utf8PathBuf>, ConfigDocumentError> {
        let disks = self
            .root
            .get("disks")
            .and_then(Value::as_array)
            .ok_or_else(|| self.missing("disks"))?;
        disks
            .iter()
            .map(|disk| {
                disk.get("path")
                    .and_then(Value::as_str)
                    .map(Utf8PathBuf::from)
                    .ok_or_else(|| self.missing("disks[].path"))
            })
            .collect()
    }

    /// Shardnode data directories from `disks_config.disks`. Absent sections
    /// yield an empty list; non-string entries are skipped.
    #[must_use]
    pub fn shardnode_disks(&self) -> Vec<Utf8PathBuf> {
        self.root
            .get("disks_config")
            .and_then(|section| section.get("disks"))
            .and_then(Value::as_array)
            .map(|disks| {
                disks
                    .iter()
                    .filter_map(Value::as_str)
                    .map(Utf8PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn missing(&self, key: &'static str) -> ConfigDocumentError {
        ConfigDocumentError::MissingKey {
            path: self.path.clone(),
            key,
        }
    }
}
