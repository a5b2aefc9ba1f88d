//! Job domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A build definition on a runner, optionally tied to one build
///
/// An empty `build` means the job has not been started yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub runner: String,
    pub name: String,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Job {
    /// Creates a job that has not been started yet
    pub fn new(runner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
            name: name.into(),
            build: String::new(),
            options: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    /// Returns the same job pinned to a build
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = build.into();
        self
    }

    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Copies the job, overriding options and replacing tags
    ///
    /// Options given here win over the original ones. Tags are taken from the
    /// original only when `tags` is empty; otherwise the new list replaces
    /// them completely so that old and new contexts never mix.
    pub fn copy(&self, options: &BTreeMap<String, String>, tags: &[String]) -> Job {
        let mut merged = self.options.clone();
        merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));

        let tags = if tags.is_empty() {
            self.tags.clone()
        } else {
            tags.to_vec()
        };

        Job {
            runner: self.runner.clone(),
            name: self.name.clone(),
            build: self.build.clone(),
            options: merged,
            tags,
        }
    }

    /// Whether this job and `other` belong to the same (runner, job) group
    pub fn same_group(&self, other: &Job) -> bool {
        self.runner == other.runner && self.name == other.name
    }

    /// Whether this job refers to the same build as `other`
    pub fn same_build(&self, other: &Job) -> bool {
        self.same_group(other) && self.build == other.build
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.runner, self.name, self.build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Job {
        Job::new("ci", "unit-tests")
            .with_build("42")
            .with_options(BTreeMap::from([
                ("branch".to_string(), "main".to_string()),
                ("arch".to_string(), "x86".to_string()),
            ]))
            .with_tags(vec!["nightly".to_string(), "slow".to_string()])
    }

    #[test]
    fn test_copy_without_overrides_keeps_everything() {
        let job = sample();
        let copy = job.copy(&BTreeMap::new(), &[]);
        assert_eq!(copy, job);
    }

    #[test]
    fn test_copy_overrides_only_given_options() {
        let job = sample();
        let copy = job.copy(
            &BTreeMap::from([("branch".to_string(), "dev".to_string())]),
            &[],
        );
        assert_eq!(copy.options["branch"], "dev");
        assert_eq!(copy.options["arch"], "x86");
        assert_eq!(copy.tags, job.tags);
    }

    #[test]
    fn test_copy_replaces_tags_wholesale() {
        let job = sample();
        let copy = job.copy(&BTreeMap::new(), &["x".to_string()]);
        assert_eq!(copy.tags, vec!["x".to_string()]);
        assert_eq!(copy.options, job.options);
    }

    #[test]
    fn test_copy_adds_new_option_keys() {
        let copy = sample().copy(
            &BTreeMap::from([("retry".to_string(), "1".to_string())]),
            &[],
        );
        assert_eq!(copy.options.len(), 3);
    }

    #[test]
    fn test_group_and_build_identity() {
        let a = sample();
        let b = sample().with_build("43");
        assert!(a.same_group(&b));
        assert!(!a.same_build(&b));
        assert!(a.same_build(&sample()));
        assert!(!a.same_group(&Job::new("ci", "lint")));
    }
}
