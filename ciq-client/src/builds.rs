//! Job and build endpoints

use async_trait::async_trait;
use ciq_core::domain::status::{RemoteStatus, TestReport, VcsInfo};
use tracing::{debug, warn};

use crate::JenkinsClient;
use crate::error::Result;
use crate::schema::{self, BuildDocument, BuildList, GitDocument, JobList};
use crate::server::BuildServer;

impl JenkinsClient {
    /// Fetch the test report of a build
    ///
    /// # Returns
    /// `None` when the build has no report or the report cannot be parsed.
    async fn test_report(&self, job: &str, build: &str, details: bool) -> Result<Option<TestReport>> {
        let tree = if details {
            format!("{}{}", schema::REPORT_TREE, schema::REPORT_CASES_TREE)
        } else {
            schema::REPORT_TREE.to_string()
        };
        let url = self.api_url(&format!("job/{job}/{build}/testReport"), &tree);

        let (status, body) = self.fetch(&url).await?;
        if !status.is_success() {
            debug!("No test report for {} #{} ({})", job, build, status);
            return Ok(None);
        }

        match schema::parse_test_report(&body) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                debug!("Unparsable test report for {} #{}: {}", job, build, e);
                Ok(None)
            }
        }
    }

    /// Fetch git plugin data of a build
    ///
    /// # Returns
    /// `None` when the document is missing or cannot be parsed.
    async fn vcs_info(&self, job: &str, build: &str) -> Result<Option<VcsInfo>> {
        let url = self.api_url(&format!("job/{job}/{build}/git"), schema::GIT_TREE);

        let (status, body) = self.fetch(&url).await?;
        if !status.is_success() {
            warn!("No git data for {} #{} ({})", job, build, status);
            return Ok(None);
        }

        match serde_json::from_slice::<GitDocument>(&body) {
            Ok(doc) => Ok(Some(VcsInfo::from(doc))),
            Err(e) => {
                warn!("Failed to parse git data for {} #{}: {}", job, build, e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl BuildServer for JenkinsClient {
    async fn list_jobs(&self) -> Result<Vec<String>> {
        let url = self.api_url("view/All", schema::JOBS_TREE);
        let jobs: JobList = self.get_json(&url).await?;

        Ok(jobs.jobs.into_iter().map(|job| job.name).collect())
    }

    async fn list_builds(&self, job: &str) -> Result<Vec<String>> {
        let url = self.api_url(&format!("job/{job}"), schema::BUILDS_TREE);
        let builds: BuildList = self.get_json(&url).await?;

        Ok(builds
            .builds
            .into_iter()
            .map(|build| build.number.to_string())
            .collect())
    }

    async fn query_status(&self, job: &str, build: &str, details: bool) -> Result<RemoteStatus> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.retrieve(&self.runner, job, build).await? {
                return Ok(cached);
            }
        }

        // cache entries always carry test details
        let details = details || self.cache.is_some();

        let url = self.api_url(&format!("job/{job}/{build}"), schema::STATUS_TREE);
        let doc: BuildDocument = self.get_json(&url).await?;

        let mut status = RemoteStatus::from(doc);
        status.test_report = self.test_report(job, build, details).await?;
        status.vcs = self.vcs_info(job, build).await?;

        if let Some(cache) = &self.cache {
            cache.store(&self.runner, job, build, &status).await?;
        }

        Ok(status)
    }
}
