//! Build status domain types
//!
//! `RemoteStatus` is what a CI server reports for one build. It is also the
//! format of the local result cache, so it stays serializable.
//! `JobStatus` pairs a registry job with the outcome of querying it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::job::Job;

/// Result string reported for successful builds
pub const SUCCESS: &str = "SUCCESS";

/// Test case statuses that count as passing and are pruned from reports
pub const PASSING_CASE_STATUSES: [&str; 3] = ["PASSED", "FIXED", "SKIPPED"];

/// Outcome of querying one job
///
/// A remote error is data here: it travels with its job until a renderer
/// decides how to show it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job: Job,
    pub status: Option<RemoteStatus>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn new(job: Job, status: RemoteStatus) -> Self {
        Self {
            job,
            status: Some(status),
            error: None,
        }
    }

    pub fn failed(job: Job, error: impl Into<String>) -> Self {
        Self {
            job,
            status: None,
            error: Some(error.into()),
        }
    }

    /// A job counts as failing when its build failed or no status is known
    pub fn is_failing(&self) -> bool {
        self.status.as_ref().is_none_or(RemoteStatus::is_failed)
    }

    /// Start time of the build, if known
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.status.as_ref().and_then(RemoteStatus::started_at)
    }
}

/// Status of one build as reported by the CI server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub building: bool,
    #[serde(default)]
    pub result: String,
    /// Start time in milliseconds since the epoch, 0 when unknown
    #[serde(default)]
    pub timestamp: i64,
    /// Build duration in milliseconds, 0 while running
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub built_on: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub test_report: Option<TestReport>,
    #[serde(default)]
    pub vcs: Option<VcsInfo>,
    #[serde(default)]
    pub user: Option<String>,
}

impl RemoteStatus {
    /// A build has failed when it finished without success
    pub fn is_failed(&self) -> bool {
        self.result != SUCCESS && !self.building
    }

    /// Display state, `RUNNING` while the build is in progress
    pub fn state(&self) -> &str {
        if self.building { "RUNNING" } else { &self.result }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp == 0 {
            return None;
        }
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.duration.max(0) as u64)
    }
}

/// Version control details of a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    pub commit_id: String,
    pub branch: String,
}

/// Test results of a build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub pass_count: i64,
    pub skip_count: i64,
    pub fail_count: i64,
    #[serde(default)]
    pub suites: Vec<TestSuite>,
}

impl TestReport {
    /// Drops passing cases and the suites left empty by that
    pub fn prune(&mut self) {
        for suite in &mut self.suites {
            suite.cases.retain(|case| !case.is_passing());
        }
        self.suites.retain(|suite| !suite.cases.is_empty());
    }

    /// Iterates over the cases that did not pass
    pub fn failing_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.suites
            .iter()
            .flat_map(|suite| suite.cases.iter())
            .filter(|case| !case.is_passing())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub status: String,
    pub name: String,
    pub class_name: String,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub error_stack_trace: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

impl TestCase {
    pub fn is_passing(&self) -> bool {
        PASSING_CASE_STATUSES.contains(&self.status.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(status: &str, name: &str) -> TestCase {
        TestCase {
            status: status.to_string(),
            name: name.to_string(),
            class_name: "suite.Class".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_means_finished_without_success() {
        let mut status = RemoteStatus {
            result: "FAILURE".to_string(),
            ..Default::default()
        };
        assert!(status.is_failed());

        status.building = true;
        assert!(!status.is_failed());
        assert_eq!(status.state(), "RUNNING");

        status.building = false;
        status.result = SUCCESS.to_string();
        assert!(!status.is_failed());
        assert_eq!(status.state(), "SUCCESS");
    }

    #[test]
    fn test_job_without_status_counts_as_failing() {
        let job = JobStatus::failed(Job::new("ci", "build"), "connection refused");
        assert!(job.is_failing());
        assert!(job.started_at().is_none());
    }

    #[test]
    fn test_zero_timestamp_is_unknown() {
        let mut status = RemoteStatus::default();
        assert!(status.started_at().is_none());

        status.timestamp = 1_400_000_000_000;
        assert_eq!(
            status.started_at().map(|t| t.timestamp()),
            Some(1_400_000_000)
        );
    }

    #[test]
    fn test_prune_drops_passing_cases_and_empty_suites() {
        let mut report = TestReport {
            pass_count: 3,
            skip_count: 1,
            fail_count: 1,
            suites: vec![
                TestSuite {
                    cases: vec![case("PASSED", "a"), case("SKIPPED", "b")],
                },
                TestSuite {
                    cases: vec![case("FIXED", "c"), case("REGRESSION", "d")],
                },
            ],
        };

        report.prune();

        assert_eq!(report.suites.len(), 1);
        assert_eq!(report.suites[0].cases, vec![case("REGRESSION", "d")]);
        assert_eq!(report.failing_cases().count(), 1);
    }
}
