//! Jenkins JSON documents
//!
//! Wire shapes of the Jenkins remote API, kept private to the client and
//! converted into `ciq_core` domain types right after parsing.

use ciq_core::domain::status::{RemoteStatus, TestCase, TestReport, TestSuite, VcsInfo};
use serde::Deserialize;

/// `tree` selector for the job list
pub(crate) const JOBS_TREE: &str = "jobs[name]";

/// `tree` selector for the build list of one job
pub(crate) const BUILDS_TREE: &str = "builds[number]";

/// `tree` selector for the main build document
pub(crate) const STATUS_TREE: &str =
    "building,duration,builtOn,result,timestamp,url,actions[causes[userId]]";

/// `tree` selector for test report counters
pub(crate) const REPORT_TREE: &str = "duration,failCount,passCount,skipCount";

/// Extra selector for individual test cases
pub(crate) const REPORT_CASES_TREE: &str =
    ",suites[cases[status,name,className,duration,errorStackTrace,stderr,stdout]]";

/// `tree` selector for git plugin data
pub(crate) const GIT_TREE: &str = "lastBuiltRevision[branch[SHA1,name]],remoteUrls";

#[derive(Debug, Deserialize)]
pub(crate) struct JobList {
    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildList {
    #[serde(default)]
    pub builds: Vec<BuildEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildEntry {
    pub number: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildDocument {
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub built_on: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Action {
    #[serde(default)]
    pub causes: Vec<Cause>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Cause {
    #[serde(default)]
    pub user_id: Option<String>,
}

impl From<BuildDocument> for RemoteStatus {
    fn from(doc: BuildDocument) -> Self {
        let user = doc
            .actions
            .iter()
            .flat_map(|action| action.causes.iter())
            .filter_map(|cause| cause.user_id.as_deref())
            .find(|id| !id.is_empty())
            .map(str::to_string);

        RemoteStatus {
            building: doc.building,
            result: doc.result.unwrap_or_default(),
            timestamp: doc.timestamp,
            duration: doc.duration,
            built_on: doc.built_on.unwrap_or_default(),
            url: doc.url.unwrap_or_default(),
            test_report: None,
            vcs: None,
            user,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportDocument {
    #[serde(default)]
    pub fail_count: i64,
    #[serde(default)]
    pub pass_count: i64,
    #[serde(default)]
    pub skip_count: i64,
    #[serde(default)]
    pub suites: Vec<SuiteDocument>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SuiteDocument {
    #[serde(default)]
    pub cases: Vec<CaseDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CaseDocument {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error_stack_trace: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

impl From<ReportDocument> for TestReport {
    fn from(doc: ReportDocument) -> Self {
        TestReport {
            pass_count: doc.pass_count,
            skip_count: doc.skip_count,
            fail_count: doc.fail_count,
            suites: doc
                .suites
                .into_iter()
                .map(|suite| TestSuite {
                    cases: suite
                        .cases
                        .into_iter()
                        .map(|case| TestCase {
                            status: case.status,
                            name: case.name,
                            class_name: case.class_name,
                            duration: case.duration.unwrap_or_default(),
                            error_stack_trace: case.error_stack_trace,
                            stdout: case.stdout,
                            stderr: case.stderr,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Parses a test report, tolerating the `NaN` numbers Jenkins emits
///
/// Jenkins may produce `{"duration":NaN,...}`, which is not JSON. On a parse
/// failure every `":NaN` is replaced by `":null` and parsing is retried.
/// The returned report is already pruned of passing cases.
pub(crate) fn parse_test_report(body: &[u8]) -> Result<TestReport, serde_json::Error> {
    let doc = match serde_json::from_slice::<ReportDocument>(body) {
        Ok(doc) => doc,
        Err(first) => {
            let text = String::from_utf8_lossy(body);
            if !text.contains("\":NaN") {
                return Err(first);
            }
            serde_json::from_str::<ReportDocument>(&text.replace("\":NaN", "\":null"))?
        }
    };

    let mut report = TestReport::from(doc);
    report.prune();
    Ok(report)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitDocument {
    #[serde(default)]
    pub last_built_revision: Option<Revision>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Revision {
    #[serde(default)]
    pub branch: Vec<Branch>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Branch {
    #[serde(default, rename = "SHA1")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<GitDocument> for VcsInfo {
    fn from(doc: GitDocument) -> Self {
        let branches = doc
            .last_built_revision
            .map(|revision| revision.branch)
            .unwrap_or_default();

        let first_set = |pick: fn(&Branch) -> Option<&String>| {
            branches
                .iter()
                .filter_map(pick)
                .find(|value| !value.is_empty())
                .cloned()
                .unwrap_or_default()
        };

        VcsInfo {
            commit_id: first_set(|b| b.sha1.as_ref()),
            branch: first_set(|b| b.name.as_ref()),
        }
    }
}
