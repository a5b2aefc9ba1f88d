//! Build server abstraction
//!
//! Stages talk to CI servers through the [`BuildServer`] trait and look them
//! up by runner id in a [`ServerPool`], which lets tests swap in fakes.

use async_trait::async_trait;
use ciq_core::domain::runner::Runner;
use ciq_core::domain::status::RemoteStatus;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::JenkinsClient;
use crate::cache::ResultCache;
use crate::error::{ClientError, Result};
use crate::limits::IoLimits;

/// Read-only queries against one CI server
#[async_trait]
pub trait BuildServer: Send + Sync {
    /// Lists the names of all jobs on the server
    async fn list_jobs(&self) -> Result<Vec<String>>;

    /// Lists the build ids of a job, newest first as the server reports them
    async fn list_builds(&self, job: &str) -> Result<Vec<String>>;

    /// Queries the status of one build
    ///
    /// # Arguments
    /// * `job` - Job name
    /// * `build` - Build id
    /// * `details` - Also fetch individual test cases
    async fn query_status(&self, job: &str, build: &str, details: bool) -> Result<RemoteStatus>;
}

/// Build servers by runner id
#[derive(Clone, Default)]
pub struct ServerPool {
    servers: BTreeMap<String, Arc<dyn BuildServer>>,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one Jenkins client per configured runner
    ///
    /// # Arguments
    /// * `runners` - Runners by id
    /// * `limits` - Limits shared by all clients
    /// * `cache_dir` - Root of the result cache, `None` disables caching
    pub fn from_runners(
        runners: &BTreeMap<String, Runner>,
        limits: &IoLimits,
        cache_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut pool = Self::new();
        for (id, runner) in runners {
            let mut client = JenkinsClient::new(id.clone(), runner, limits.clone())?;
            if let Some(dir) = cache_dir {
                client = client.with_cache(ResultCache::new(dir, limits.clone()));
            }
            pool.insert(id.clone(), Arc::new(client));
        }
        Ok(pool)
    }

    pub fn insert(&mut self, runner_id: impl Into<String>, server: Arc<dyn BuildServer>) {
        self.servers.insert(runner_id.into(), server);
    }

    /// Resolves a runner id
    pub fn get(&self, runner_id: &str) -> Result<Arc<dyn BuildServer>> {
        self.servers
            .get(runner_id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownRunner(runner_id.to_string()))
    }

    /// Runner ids in ascending order
    pub fn runner_ids(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_runners_resolves_ids() {
        let mut runners = BTreeMap::new();
        runners.insert("qa".to_string(), Runner::new("https://qa.example.com"));
        runners.insert("ci".to_string(), Runner::new("https://ci.example.com"));

        let pool = ServerPool::from_runners(&runners, &IoLimits::new(1, 1), None).unwrap();

        assert_eq!(pool.runner_ids().collect::<Vec<_>>(), vec!["ci", "qa"]);
        assert!(pool.get("ci").is_ok());
        assert!(matches!(
            pool.get("prod"),
            Err(ClientError::UnknownRunner(id)) if id == "prod"
        ));
    }
}
