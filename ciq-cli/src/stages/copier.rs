//! Job copies for restarts

use anyhow::Result;
use async_trait::async_trait;
use ciq_core::domain::job::Job;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Turns queried statuses back into jobs, applying option and tag overrides
pub struct JobCopier {
    options: BTreeMap<String, String>,
    tags: Vec<String>,
    input: mpsc::Receiver<JobStatus>,
    output: mpsc::Sender<Job>,
}

impl JobCopier {
    /// # Arguments
    /// * `options` - Options overriding the original ones
    /// * `tags` - Replacement tags, empty keeps the original tags
    pub fn new(
        options: BTreeMap<String, String>,
        tags: Vec<String>,
        input: mpsc::Receiver<JobStatus>,
        output: mpsc::Sender<Job>,
    ) -> Self {
        Self {
            options,
            tags,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for JobCopier {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        while let Some(status) = ctx.recv(&mut self.input).await {
            let job = status.job.copy(&self.options, &self.tags);
            if !ctx.emit(&self.output, job).await {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{drain, feed, status};
    use ciq_pipeline::Pipeline;

    #[tokio::test]
    async fn test_copies_with_overrides() {
        let mut original = status("ci", "unit", "7", "FAILURE");
        original.job.options.insert("branch".into(), "main".into());
        original.job.options.insert("arch".into(), "x86".into());
        original.job.tags = vec!["nightly".into()];

        let options = BTreeMap::from([("branch".to_string(), "fix".to_string())]);
        let (tx, rx) = mpsc::channel(10);
        let collector = tokio::spawn(drain(rx));

        let errors = Pipeline::builder()
            .stage(JobCopier::new(
                options,
                vec!["retry".into()],
                feed(vec![original]),
                tx,
            ))
            .start()
            .collect()
            .await;

        assert!(errors.is_empty());
        let copies = collector.await.unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].options["branch"], "fix");
        assert_eq!(copies[0].options["arch"], "x86");
        assert_eq!(copies[0].tags, vec!["retry"]);
    }
}
