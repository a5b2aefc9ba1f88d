//! Job selection flags and predicates
//!
//! `FilterArgs` holds the raw command-line selection; `JobMatcher` is its
//! compiled form used by the filter stages. All string comparisons use
//! shell globs.

use anyhow::{Context, Result};
use ciq_core::domain::job::Job;
use clap::Args;

use crate::glob::Pattern;

/// Selection of registry jobs and their results
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Select only builds with tag: `-t A -t B` means A or B, `-t A,B` means A and B, `-t -` means untagged
    #[arg(short = 't', long = "tag", value_name = "TAG[,TAG]")]
    pub tags: Vec<String>,

    /// Select only builds with option key:value (value may be a glob)
    #[arg(short = 'o', long = "option", value_name = "KEY:VALUE", value_parser = parse_key_val)]
    pub options: Vec<(String, String)>,

    /// Select only builds for the given runner
    #[arg(short = 'r', long = "runner")]
    pub runners: Vec<String>,

    /// Select only builds for the given job
    #[arg(short = 'j', long = "job")]
    pub jobs: Vec<String>,

    /// Select only builds with build number
    #[arg(short = 'b', long = "build")]
    pub builds: Vec<String>,

    /// Select only failed builds
    #[arg(long = "all-failed", conflicts_with = "failing")]
    pub all_failed: bool,

    /// Select only currently failing builds
    #[arg(long = "failing")]
    pub failing: bool,
}

/// Which results survive the post-query result filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Pass everything
    #[default]
    All,
    /// Pass every failed build
    AllFailed,
    /// Pass the last failed build of each failing streak
    Failing,
}

impl FilterArgs {
    pub fn failure_mode(&self) -> FailureMode {
        if self.all_failed {
            FailureMode::AllFailed
        } else if self.failing {
            FailureMode::Failing
        } else {
            FailureMode::All
        }
    }

    /// Compiles every pattern, failing on the first malformed one
    pub fn matcher(&self) -> Result<JobMatcher> {
        let tag_groups = self
            .tags
            .iter()
            .map(|group| {
                if group == "-" {
                    return Ok(TagGroup::Untagged);
                }
                group
                    .split(',')
                    .map(compile)
                    .collect::<Result<Vec<_>>>()
                    .map(TagGroup::AllOf)
            })
            .collect::<Result<Vec<_>>>()?;

        let options = self
            .options
            .iter()
            .map(|(key, value)| Ok((key.clone(), compile(value)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(JobMatcher {
            tag_groups,
            options,
            runners: compile_all(&self.runners)?,
            jobs: compile_all(&self.jobs)?,
            builds: compile_all(&self.builds)?,
        })
    }
}

/// Parses `key:value` or `key=value`
pub fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find([':', '='])
        .ok_or_else(|| anyhow::anyhow!("invalid KEY:value: no `:` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).with_context(|| format!("invalid filter '{}'", pattern))
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| compile(p)).collect()
}

#[derive(Debug, Clone)]
enum TagGroup {
    /// Matches jobs without any tag
    Untagged,
    /// Every pattern must match one of the job's tags
    AllOf(Vec<Pattern>),
}

impl TagGroup {
    fn matches(&self, tags: &[String]) -> bool {
        match self {
            TagGroup::Untagged => tags.is_empty(),
            TagGroup::AllOf(patterns) => patterns
                .iter()
                .all(|pattern| tags.iter().any(|tag| pattern.matches(tag))),
        }
    }
}

/// Compiled job predicates
#[derive(Debug, Clone, Default)]
pub struct JobMatcher {
    tag_groups: Vec<TagGroup>,
    options: Vec<(String, Pattern)>,
    runners: Vec<Pattern>,
    jobs: Vec<Pattern>,
    builds: Vec<Pattern>,
}

impl JobMatcher {
    /// True when `job` passes every active predicate
    pub fn matches(&self, job: &Job) -> bool {
        self.matches_tags(job)
            && self.matches_options(job)
            && self.matches_job_name(&job.name)
            && any_match(&self.builds, &job.build)
            && any_match(&self.runners, &job.runner)
    }

    /// Tag groups are alternatives, patterns within a group are all required
    fn matches_tags(&self, job: &Job) -> bool {
        self.tag_groups.is_empty() || self.tag_groups.iter().any(|g| g.matches(&job.tags))
    }

    /// Any listed option matching is enough, a missing option is empty
    fn matches_options(&self, job: &Job) -> bool {
        self.options.is_empty()
            || self.options.iter().any(|(key, pattern)| {
                pattern.matches(job.options.get(key).map(String::as_str).unwrap_or(""))
            })
    }

    pub fn matches_job_name(&self, name: &str) -> bool {
        any_match(&self.jobs, name)
    }
}

fn any_match(patterns: &[Pattern], value: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.matches(value))
}
