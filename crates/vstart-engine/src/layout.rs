//! Filesystem layout of a local deployment.
//!
//! Everything is derived from the install root: binaries live under
//! `<root>/../../build/bin/blobstore`, scratch state under `<root>/run`, and
//! the per-instance configuration documents under
//! `<root>/cfg-<version>/az-<topology>`.

use std::fs;
use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::debug;
use vstart_config::{ClusterVersion, Topology};

const LAYOUT_TARGET: &str = "vstart_engine::layout";

/// Errors raised while resolving or materialising the layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The install root was not absolute.
    #[error("install root '{path}' must be an absolute path")]
    RelativeRoot {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A scratch directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A scratch directory could not be removed.
    #[error("failed to remove directory '{path}': {source}")]
    RemoveDirectory {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Resolved absolute paths used by every service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    bin_dir: Utf8PathBuf,
    lib_dir: Utf8PathBuf,
    log_dir: Utf8PathBuf,
    pid_dir: Utf8PathBuf,
    config_dir: Utf8PathBuf,
    config_tag: String,
}

impl DirectoryLayout {
    /// Computes the layout for a deployment. Touches no files.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RelativeRoot`] when `install_root` is relative.
    pub fn resolve(
        install_root: &Utf8Path,
        version: ClusterVersion,
        topology: Topology,
    ) -> Result<Self, LayoutError> {
        if !install_root.is_absolute() {
            return Err(LayoutError::RelativeRoot {
                path: install_root.to_path_buf(),
            });
        }
        let root = normalise(install_root);
        let run = root.join("run");
        let config_tag = format!("cfg-{version}/az-{topology}");
        Ok(Self {
            bin_dir: normalise(&root.join("../../build/bin/blobstore")),
            lib_dir: run.join("lib"),
            log_dir: run.join("log"),
            pid_dir: run.join("pid"),
            config_dir: root.join(&config_tag),
            config_tag,
        })
    }

    /// Replaces the derived binary directory.
    #[must_use]
    pub fn with_bin_dir(mut self, bin_dir: &Utf8Path) -> Self {
        self.bin_dir = normalise(bin_dir);
        self
    }

    /// Directory holding the blobstore service binaries.
    #[must_use]
    pub fn bin_dir(&self) -> &Utf8Path {
        &self.bin_dir
    }

    /// Scratch data directory.
    #[must_use]
    pub fn lib_dir(&self) -> &Utf8Path {
        &self.lib_dir
    }

    /// Directory receiving launch logs.
    #[must_use]
    pub fn log_dir(&self) -> &Utf8Path {
        &self.log_dir
    }

    /// Directory receiving pid files.
    #[must_use]
    pub fn pid_dir(&self) -> &Utf8Path {
        &self.pid_dir
    }

    /// Directory holding the per-instance configuration documents.
    #[must_use]
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Configuration directory relative to the install root, e.g.
    /// `cfg-1.4.x/az-one`.
    #[must_use]
    pub fn config_tag(&self) -> &str {
        &self.config_tag
    }

    /// Path of the service binary `name`.
    #[must_use]
    pub fn binary(&self, name: &str) -> Utf8PathBuf {
        self.bin_dir.join(name)
    }

    /// Path of the configuration document `file`.
    #[must_use]
    pub fn config_file(&self, file: &str) -> Utf8PathBuf {
        self.config_dir.join(file)
    }

    /// Launch log for the service instance `name`.
    #[must_use]
    pub fn log_file(&self, name: &str) -> Utf8PathBuf {
        self.log_dir.join(format!("{name}-start.log"))
    }

    fn scratch_dirs(&self) -> [&Utf8Path; 3] {
        [&self.lib_dir, &self.log_dir, &self.pid_dir]
    }

    /// Creates the scratch, log and pid directories. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::CreateDirectory`] when a directory cannot be
    /// created.
    pub fn create_dirs(&self) -> Result<(), LayoutError> {
        for dir in self.scratch_dirs() {
            fs::create_dir_all(dir).map_err(|source| LayoutError::CreateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Recursively deletes the scratch, log and pid directories. Missing
    /// directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RemoveDirectory`] when an existing directory
    /// cannot be removed.
    pub fn remove_dirs(&self) -> Result<(), LayoutError> {
        for dir in self.scratch_dirs() {
            match fs::remove_dir_all(dir) {
                Ok(()) => debug!(target: LAYOUT_TARGET, dir = %dir, "directory removed"),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(LayoutError::RemoveDirectory {
                        path: dir.to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Lexically resolves `.` and `..` components without touching the
/// filesystem. `..` at the root stays at the root.
fn normalise(path: &Utf8Path) -> Utf8PathBuf {
    let mut resolved = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_str()),
        }
    }
    resolved
}
