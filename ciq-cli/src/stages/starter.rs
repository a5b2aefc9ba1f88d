//! Build starts
//!
//! Builds are started strictly one at a time, in input order.

use anyhow::{Result, bail};
use async_trait::async_trait;
use ciq_client::BuildTrigger;
use ciq_core::domain::job::Job;
use ciq_core::domain::runner::Runner;
use ciq_pipeline::{Stage, StageContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Starts every incoming job and emits it with its new build id
pub struct JobStarter {
    runners: BTreeMap<String, Runner>,
    trigger: Arc<dyn BuildTrigger>,
    input: mpsc::Receiver<Job>,
    output: mpsc::Sender<Job>,
}

impl JobStarter {
    /// # Arguments
    /// * `runners` - Known runners by id
    /// * `trigger` - Mechanism used to start builds
    pub fn new(
        runners: BTreeMap<String, Runner>,
        trigger: Arc<dyn BuildTrigger>,
        input: mpsc::Receiver<Job>,
        output: mpsc::Sender<Job>,
    ) -> Self {
        Self {
            runners,
            trigger,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for JobStarter {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        while let Some(job) = ctx.recv(&mut self.input).await {
            let Some(runner) = self.runners.get(&job.runner) else {
                bail!(
                    "runner '{}' does not exist, use the 'runner add' command",
                    job.runner
                );
            };

            debug!("Starting {} on {}", job.name, job.runner);
            let build = self
                .trigger
                .start_build(runner, &job.name, &job.options)
                .await?;
            info!("Started {} #{} on {}", job.name, build, job.runner);

            if !ctx.emit(&self.output, job.with_build(build)).await {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{FakeTrigger, drain, feed};
    use ciq_pipeline::Pipeline;

    fn runners() -> BTreeMap<String, Runner> {
        BTreeMap::from([("ci".to_string(), Runner::new("https://ci.example.com"))])
    }

    #[tokio::test]
    async fn test_assigns_builds_in_order() {
        let jobs = vec![Job::new("ci", "unit"), Job::new("ci", "lint")];
        let (tx, rx) = mpsc::channel(10);
        let collector = tokio::spawn(drain(rx));

        let errors = Pipeline::builder()
            .stage(JobStarter::new(
                runners(),
                Arc::new(FakeTrigger::starting_at(41)),
                feed(jobs),
                tx,
            ))
            .start()
            .collect()
            .await;

        assert!(errors.is_empty());
        let started: Vec<String> = collector
            .await
            .unwrap()
            .iter()
            .map(|j| j.to_string())
            .collect();
        assert_eq!(started, vec!["ci unit 41", "ci lint 42"]);
    }

    #[tokio::test]
    async fn test_start_failure_stops_the_stage() {
        let trigger = FakeTrigger {
            fail_on: Some("lint".to_string()),
            ..FakeTrigger::starting_at(1)
        };
        let jobs = vec![
            Job::new("ci", "unit"),
            Job::new("ci", "lint"),
            Job::new("ci", "docs"),
        ];
        let (tx, rx) = mpsc::channel(10);
        let collector = tokio::spawn(drain(rx));

        let errors = Pipeline::builder()
            .stage(JobStarter::new(runners(), Arc::new(trigger), feed(jobs), tx))
            .start()
            .collect()
            .await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("job lint start failed"));
        let started = collector.await.unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].name, "unit");
    }

    #[tokio::test]
    async fn test_unknown_runner_is_fatal() {
        let (tx, rx) = mpsc::channel(10);
        let errors = Pipeline::builder()
            .stage(JobStarter::new(
                runners(),
                Arc::new(FakeTrigger::starting_at(1)),
                feed(vec![Job::new("qa", "unit")]),
                tx,
            ))
            .start()
            .collect()
            .await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("runner 'qa' does not exist"));
        assert!(drain(rx).await.is_empty());
    }
}
