//! ciq CI Client
//!
//! Talks to Jenkins-compatible CI servers: the JSON remote API for listing
//! jobs and querying build status, and the SSH command interface for
//! starting builds.
//!
//! All network and cache traffic goes through a shared [`IoLimits`] value so
//! concurrent queries stay within process-wide bounds.
//!
//! # Example
//!
//! ```no_run
//! use ciq_client::{BuildServer, IoLimits, JenkinsClient};
//! use ciq_core::domain::runner::Runner;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = Runner::new("https://ci.example.com");
//!     let client = JenkinsClient::new("ci", &runner, IoLimits::default())?;
//!
//!     for job in client.list_jobs().await? {
//!         println!("{job}");
//!     }
//!     Ok(())
//! }
//! ```

mod builds;
pub mod cache;
pub mod error;
pub mod limits;
mod schema;
pub mod server;
pub mod trigger;

// Re-export commonly used types
pub use cache::ResultCache;
pub use error::{ClientError, Result};
pub use limits::IoLimits;
pub use server::{BuildServer, ServerPool};
pub use trigger::{BuildTrigger, SshTrigger};

use ciq_core::domain::runner::Runner;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for one Jenkins server
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    /// Registry id of the runner, used as the cache namespace
    runner: String,
    /// Base URL of the server (e.g., "https://ci.example.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
    limits: IoLimits,
    cache: Option<ResultCache>,
}

impl JenkinsClient {
    /// Create a client for a configured runner
    ///
    /// # Arguments
    /// * `runner_id` - The runner's registry id
    /// * `runner` - Runner settings, `insecure` disables certificate checks
    /// * `limits` - Shared I/O limits
    pub fn new(runner_id: impl Into<String>, runner: &Runner, limits: IoLimits) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(runner.insecure)
            .build()?;
        Ok(Self::with_client(runner_id, &runner.url, client, limits))
    }

    /// Create a client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        runner_id: impl Into<String>,
        base_url: impl Into<String>,
        client: Client,
        limits: IoLimits,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            runner: runner_id.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            limits,
            cache: None,
        }
    }

    /// Serve finished builds from `cache` and store new ones there
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn api_url(&self, path: &str, tree: &str) -> String {
        format!("{}/{}/api/json?tree={}", self.base_url, path, tree)
    }

    /// Fetch a document without judging its status code
    ///
    /// The network permit is held until the whole body has been read.
    async fn fetch(&self, url: &str) -> Result<(reqwest::StatusCode, Vec<u8>)> {
        let _permit = self.limits.network().await?;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    /// Fetch and deserialize a document, failing on error statuses
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let (status, body) = self.fetch(url).await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&body).trim().to_string();
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let runner = Runner::new("https://ci.example.com/");
        let client = JenkinsClient::new("ci", &runner, IoLimits::new(1, 1)).unwrap();
        assert_eq!(
            client.api_url("job/unit", "builds[number]"),
            "https://ci.example.com/job/unit/api/json?tree=builds[number]"
        );
    }

    #[test]
    fn test_api_url() {
        let client = JenkinsClient::with_client(
            "ci",
            "https://ci.example.com",
            Client::new(),
            IoLimits::new(1, 1),
        );
        assert_eq!(
            client.api_url("view/All", "jobs[name]"),
            "https://ci.example.com/view/All/api/json?tree=jobs[name]"
        );
    }

    #[test]
    fn test_insecure_runner_builds_client() {
        let mut runner = Runner::new("https://self-signed.example.com");
        runner.insecure = true;
        assert!(JenkinsClient::new("qa", &runner, IoLimits::new(1, 1)).is_ok());
    }
}
