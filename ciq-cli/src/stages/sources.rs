//! Job sources

use anyhow::{Context, Result};
use async_trait::async_trait;
use ciq_client::ServerPool;
use ciq_core::domain::job::Job;
use ciq_pipeline::{Stage, StageContext};
use tokio::sync::mpsc;
use tracing::debug;

use crate::filter::JobMatcher;

/// Emits a fixed list of jobs in order
pub struct JobSource {
    jobs: Vec<Job>,
    output: mpsc::Sender<Job>,
}

impl JobSource {
    pub fn new(jobs: Vec<Job>, output: mpsc::Sender<Job>) -> Self {
        Self { jobs, output }
    }
}

#[async_trait]
impl Stage for JobSource {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        for job in std::mem::take(&mut self.jobs) {
            if !ctx.emit(&self.output, job).await {
                break;
            }
        }
        Ok(())
    }
}

/// Lists every build of every matching job on every runner
///
/// Runners are visited in name order; jobs and builds come in server order.
pub struct RemoteJobSource {
    servers: ServerPool,
    matcher: JobMatcher,
    output: mpsc::Sender<Job>,
}

impl RemoteJobSource {
    pub fn new(servers: ServerPool, matcher: JobMatcher, output: mpsc::Sender<Job>) -> Self {
        Self {
            servers,
            matcher,
            output,
        }
    }
}

#[async_trait]
impl Stage for RemoteJobSource {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let runners: Vec<String> = self.servers.runner_ids().map(str::to_string).collect();

        for runner in runners {
            let server = self.servers.get(&runner)?;
            let jobs = server
                .list_jobs()
                .await
                .with_context(|| format!("failed to list jobs on {}", runner))?;

            for name in jobs.into_iter().filter(|n| self.matcher.matches_job_name(n)) {
                let builds = server
                    .list_builds(&name)
                    .await
                    .with_context(|| format!("failed to list builds of {} on {}", name, runner))?;
                debug!("{} {}: {} builds", runner, name, builds.len());

                for build in builds {
                    let job = Job::new(runner.as_str(), name.as_str()).with_build(build);
                    if !ctx.emit(&self.output, job).await {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
}
