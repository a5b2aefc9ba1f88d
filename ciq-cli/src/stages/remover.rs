//! Registry removal

use anyhow::Result;
use async_trait::async_trait;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::io::Write;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Output, SharedRegistry, lock};

/// Drops every incoming build from the shared registry
///
/// The registry is only changed in memory; the caller decides whether to
/// save it once the pipeline is done.
pub struct JobRemover {
    registry: SharedRegistry,
    out: Output,
    input: mpsc::Receiver<JobStatus>,
}

impl JobRemover {
    pub fn new(registry: SharedRegistry, out: Output, input: mpsc::Receiver<JobStatus>) -> Self {
        Self {
            registry,
            out,
            input,
        }
    }
}

#[async_trait]
impl Stage for JobRemover {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        while let Some(status) = ctx.recv(&mut self.input).await {
            let removed = lock(&self.registry).remove_build(&status.job);
            debug!("{} registry entries match {}", removed.len(), status.job);
            for job in removed {
                writeln!(self.out, "removed {}", job)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
