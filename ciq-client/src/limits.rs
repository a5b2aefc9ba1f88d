//! Process-wide I/O limits
//!
//! One `IoLimits` value is created per command and cloned into every client
//! and cache, so all of them draw from the same permit pools.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;

/// Concurrent network requests allowed by default
pub const DEFAULT_NETWORK_LIMIT: usize = 10;

/// Counting semaphores bounding network and cache file operations
#[derive(Debug, Clone)]
pub struct IoLimits {
    network: Arc<Semaphore>,
    cache: Arc<Semaphore>,
}

impl Default for IoLimits {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_LIMIT, num_cpus::get() * 2)
    }
}

impl IoLimits {
    /// Creates limits with explicit pool sizes
    ///
    /// # Arguments
    /// * `network` - Concurrent HTTP requests
    /// * `cache` - Concurrent cache file operations
    pub fn new(network: usize, cache: usize) -> Self {
        Self {
            network: Arc::new(Semaphore::new(network.max(1))),
            cache: Arc::new(Semaphore::new(cache.max(1))),
        }
    }

    /// Waits for a network slot, released when the permit drops
    pub async fn network(&self) -> Result<OwnedSemaphorePermit> {
        Ok(self.network.clone().acquire_owned().await?)
    }

    /// Waits for a cache file slot, released when the permit drops
    pub async fn cache(&self) -> Result<OwnedSemaphorePermit> {
        Ok(self.cache.clone().acquire_owned().await?)
    }

    pub fn available_network(&self) -> usize {
        self.network.available_permits()
    }

    pub fn available_cache(&self) -> usize {
        self.cache.available_permits()
    }
}
