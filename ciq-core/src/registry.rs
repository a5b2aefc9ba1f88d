//! Job registry
//!
//! The registry is the local JSON file holding configured runners and the
//! jobs started through ciq. It is loaded once per command and saved with a
//! write-then-rename so the target file is never left half written.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::job::Job;
use crate::domain::runner::Runner;

/// Errors raised while loading or saving the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write registry {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid registry {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Runners and jobs known to ciq
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(skip)]
    path: PathBuf,

    #[serde(default)]
    pub runners: BTreeMap<String, Runner>,

    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Registry {
    /// Loads the registry at `path`
    ///
    /// A missing file is not an error: it yields an empty registry that will
    /// be created on the first save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let mut registry = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice::<Registry>(&data).map_err(|source| {
                RegistryError::Parse {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Registry {} does not exist yet", path.display());
                Registry::default()
            }
            Err(source) => return Err(RegistryError::Read { path, source }),
        };

        registry.path = path;
        Ok(registry)
    }

    /// Persists the registry atomically
    ///
    /// The data goes to `<path>.tmp` first and is then renamed over the
    /// target, so an interrupted save can only damage the temporary file.
    pub fn save(&self) -> Result<()> {
        let write_err = |source| RegistryError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }

        let data = serde_json::to_vec_pretty(self).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, data).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        info!(
            "Saved registry {} ({} runners, {} jobs)",
            self.path.display(),
            self.runners.len(),
            self.jobs.len()
        );
        Ok(())
    }

    /// Directory holding the registry file, also the base of the result cache
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Removes every job referring to the same build as `job`
    ///
    /// Returns the removed entries in registry order.
    pub fn remove_build(&mut self, job: &Job) -> Vec<Job> {
        let (removed, kept): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| j.same_build(job));
        self.jobs = kept;
        removed
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
