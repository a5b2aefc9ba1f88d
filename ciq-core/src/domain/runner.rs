//! Runner domain model
//!
//! A runner is a configured CI server endpoint plus the credentials used to
//! trigger builds on it over SSH.

use serde::{Deserialize, Serialize};

/// SSH port used when a runner is added without one
pub const DEFAULT_SSH_PORT: u16 = 54410;

/// SSH key used when a runner is added without one
pub const DEFAULT_SSH_KEY: &str = "id_rsa";

/// A CI server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runner {
    /// Base URL of the CI server (e.g., "https://ci.example.com")
    pub url: String,

    /// Port of the server's SSH command interface, 0 means the SSH default
    #[serde(default)]
    pub ssh_port: u16,

    /// Private key file, relative names resolve under `~/.ssh`
    #[serde(default)]
    pub ssh_key: String,

    /// Login for both the HTTP API and SSH, empty means the local user
    #[serde(default)]
    pub user: String,

    /// Skip TLS certificate validation
    #[serde(default)]
    pub insecure: bool,
}

impl Runner {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_key: DEFAULT_SSH_KEY.to_string(),
            user: String::new(),
            insecure: false,
        }
    }
}
