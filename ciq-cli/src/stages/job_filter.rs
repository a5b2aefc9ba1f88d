//! Pre-query job selection

use anyhow::Result;
use async_trait::async_trait;
use ciq_core::domain::job::Job;
use ciq_pipeline::{Stage, StageContext};
use tokio::sync::mpsc;

use crate::filter::JobMatcher;

/// Passes the jobs accepted by a [`JobMatcher`], preserving order
pub struct JobFilter {
    matcher: JobMatcher,
    input: mpsc::Receiver<Job>,
    output: mpsc::Sender<Job>,
}

impl JobFilter {
    pub fn new(matcher: JobMatcher, input: mpsc::Receiver<Job>, output: mpsc::Sender<Job>) -> Self {
        Self {
            matcher,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for JobFilter {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        while let Some(job) = ctx.recv(&mut self.input).await {
            if self.matcher.matches(&job) && !ctx.emit(&self.output, job).await {
                break;
            }
        }
        Ok(())
    }
}
