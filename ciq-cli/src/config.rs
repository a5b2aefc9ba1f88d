//! CLI configuration
//!
//! Resolves the registry location and the concurrency tunables. Tunables
//! can be overridden from the environment:
//! - CIQ_QUERY_WIDTH (optional, default: 10)
//! - CIQ_NETWORK_LIMIT (optional, default: 10)
//! - CIQ_CACHE_LIMIT (optional, default: 2 × CPU count)

use anyhow::{Context, Result, anyhow};
use ciq_client::IoLimits;
use ciq_core::Registry;
use std::path::PathBuf;

use crate::stages::DEFAULT_QUERY_WIDTH;

/// Registry location relative to the home directory
const DEFAULT_REGISTRY: &str = ".ciq/default.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the registry file
    pub registry_path: PathBuf,

    /// Concurrent status queries per pipeline
    pub query_width: usize,

    /// Limits shared by every CI client
    pub limits: IoLimits,
}

impl Config {
    /// Creates a configuration with default tunables
    pub fn new(registry_path: PathBuf) -> Self {
        Self {
            registry_path,
            query_width: DEFAULT_QUERY_WIDTH,
            limits: IoLimits::default(),
        }
    }

    /// Creates the configuration from the `--config` value and the process
    /// environment
    pub fn from_env(registry_path: Option<PathBuf>) -> Result<Self> {
        Self::from_lookup(registry_path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an explicit variable lookup
    pub fn from_lookup(
        registry_path: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let registry_path = match registry_path {
            Some(path) => path,
            None => default_registry_path(lookup("HOME").map(PathBuf::from))?,
        };

        let parse = |key: &str| -> Result<Option<usize>> {
            lookup(key)
                .map(|value| {
                    value
                        .parse::<usize>()
                        .with_context(|| format!("invalid {} value '{}'", key, value))
                })
                .transpose()
        };

        let mut config = Self::new(registry_path);
        if let Some(width) = parse("CIQ_QUERY_WIDTH")? {
            config.query_width = width.max(1);
        }
        let network = parse("CIQ_NETWORK_LIMIT")?;
        let cache = parse("CIQ_CACHE_LIMIT")?;
        if network.is_some() || cache.is_some() {
            let defaults = IoLimits::default();
            config.limits = IoLimits::new(
                network.unwrap_or(defaults.available_network()),
                cache.unwrap_or(defaults.available_cache()),
            );
        }
        Ok(config)
    }

    /// Loads the registry, an absent file yields an empty one
    pub fn load_registry(&self) -> Result<Registry> {
        Registry::load(&self.registry_path)
            .with_context(|| format!("failed to load {}", self.registry_path.display()))
    }
}

/// Directory of the result cache, next to the registry file
pub fn cache_dir(registry: &Registry) -> PathBuf {
    registry.dir().join("cache")
}

/// `$HOME/.ciq/default.json`
pub fn default_registry_path(home: Option<PathBuf>) -> Result<PathBuf> {
    let home = home
        .filter(|h| !h.as_os_str().is_empty())
        .ok_or_else(|| anyhow!("HOME is not set, use --config to locate the registry"))?;
    Ok(home.join(DEFAULT_REGISTRY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_registry_under_home() {
        let config = Config::from_lookup(None, lookup(&[("HOME", "/home/dev")])).unwrap();
        assert_eq!(
            config.registry_path,
            PathBuf::from("/home/dev/.ciq/default.json")
        );
        assert_eq!(config.query_width, DEFAULT_QUERY_WIDTH);
    }

    #[test]
    fn test_explicit_path_wins() {
        let config =
            Config::from_lookup(Some("team.json".into()), lookup(&[("HOME", "/home/dev")])).unwrap();
        assert_eq!(config.registry_path, PathBuf::from("team.json"));
    }

    #[test]
    fn test_missing_home_is_an_error() {
        let err = Config::from_lookup(None, lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("HOME is not set"));
    }

    #[test]
    fn test_tunables_from_environment() {
        let config = Config::from_lookup(
            Some("r.json".into()),
            lookup(&[("CIQ_QUERY_WIDTH", "0"), ("CIQ_NETWORK_LIMIT", "3")]),
        )
        .unwrap();
        assert_eq!(config.query_width, 1);
        assert_eq!(config.limits.available_network(), 3);

        let err = Config::from_lookup(Some("r.json".into()), lookup(&[("CIQ_CACHE_LIMIT", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid CIQ_CACHE_LIMIT value 'many'"));
    }

    #[test]
    fn test_load_missing_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("default.json"));
        let registry = config.load_registry().unwrap();
        assert!(registry.jobs.is_empty());
        assert!(registry.runners.is_empty());
        assert_eq!(cache_dir(&registry), dir.path().join("cache"));
    }
}
