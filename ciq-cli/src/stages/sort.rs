//! Deterministic re-ordering after the fan-out query

use anyhow::Result;
use async_trait::async_trait;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::cmp::Ordering;
use tokio::sync::mpsc;
use tracing::debug;

/// Collects every status, then emits them ordered by runner, job and build
pub struct StatusSorter {
    input: mpsc::Receiver<JobStatus>,
    output: mpsc::Sender<JobStatus>,
}

impl StatusSorter {
    pub fn new(input: mpsc::Receiver<JobStatus>, output: mpsc::Sender<JobStatus>) -> Self {
        Self { input, output }
    }
}

/// Orders by runner, then job name, then build id
///
/// Build ids are right-aligned to width 10 and compared as text, which is
/// numeric order for up to ten digits.
pub fn compare(a: &JobStatus, b: &JobStatus) -> Ordering {
    a.job
        .runner
        .cmp(&b.job.runner)
        .then_with(|| a.job.name.cmp(&b.job.name))
        .then_with(|| build_key(&a.job.build).cmp(&build_key(&b.job.build)))
}

fn build_key(build: &str) -> String {
    format!("{:>10}", build)
}

#[async_trait]
impl Stage for StatusSorter {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let mut results = Vec::new();
        while let Some(status) = ctx.recv(&mut self.input).await {
            results.push(status);
        }
        if ctx.is_aborted() {
            return Ok(());
        }

        debug!("Sorting {} results", results.len());
        results.sort_by(compare);

        for status in results {
            if !ctx.emit(&self.output, status).await {
                break;
            }
        }
        Ok(())
    }
}
