//! Local cache of finished build results
//!
//! Finished builds never change, so their status is kept on disk under
//! `<dir>/<runner>/<job>/<build>.json` and served from there on later
//! queries. Running builds are never cached.

use ciq_core::domain::status::RemoteStatus;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::limits::IoLimits;

#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
    limits: IoLimits,
}

impl ResultCache {
    /// Creates a cache rooted at `dir`
    ///
    /// # Arguments
    /// * `dir` - Cache root, created lazily on the first store
    /// * `limits` - Shared limits, every file operation holds a cache permit
    pub fn new(dir: impl Into<PathBuf>, limits: IoLimits) -> Self {
        Self {
            dir: dir.into(),
            limits,
        }
    }

    fn entry_path(&self, runner: &str, job: &str, build: &str) -> PathBuf {
        self.dir.join(runner).join(job).join(format!("{build}.json"))
    }

    /// Looks up a cached status
    ///
    /// # Returns
    /// `None` on a cache miss. Unreadable or corrupt entries are errors.
    pub async fn retrieve(
        &self,
        runner: &str,
        job: &str,
        build: &str,
    ) -> Result<Option<RemoteStatus>> {
        let path = self.entry_path(runner, job, build);
        let _permit = self.limits.cache().await?;

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ClientError::Io { path, source }),
        };

        let status = serde_json::from_slice(&data).map_err(|e| {
            ClientError::ParseError(format!("corrupt cache entry {}: {}", path.display(), e))
        })?;
        debug!("Cache hit {}", path.display());
        Ok(Some(status))
    }

    /// Stores the status of a finished build
    ///
    /// # Returns
    /// `false` when the build is still running and nothing was written.
    pub async fn store(
        &self,
        runner: &str,
        job: &str,
        build: &str,
        status: &RemoteStatus,
    ) -> Result<bool> {
        if status.building {
            return Ok(false);
        }

        let path = self.entry_path(runner, job, build);
        let data = serde_json::to_vec_pretty(status)
            .map_err(|e| ClientError::ParseError(format!("cannot encode cache entry: {}", e)))?;

        let _permit = self.limits.cache().await?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ClientError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|source| ClientError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| ClientError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Cached {}", path.display());
        Ok(true)
    }
}
