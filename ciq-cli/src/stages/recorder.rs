//! Registry bookkeeping for started builds

use anyhow::{Context, Result};
use async_trait::async_trait;
use ciq_core::domain::job::Job;
use ciq_pipeline::{Stage, StageContext};
use std::io::Write;
use tokio::sync::mpsc;

use super::{Output, SharedRegistry, lock};

/// Appends every started job to the registry and saves it right away
///
/// Saving per job keeps the builds started before a later failure.
pub struct StartRecorder {
    registry: SharedRegistry,
    out: Output,
    input: mpsc::Receiver<Job>,
}

impl StartRecorder {
    pub fn new(registry: SharedRegistry, out: Output, input: mpsc::Receiver<Job>) -> Self {
        Self {
            registry,
            out,
            input,
        }
    }
}

#[async_trait]
impl Stage for StartRecorder {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        while let Some(job) = ctx.recv(&mut self.input).await {
            writeln!(self.out, "started job: {}", job)?;

            let mut registry = lock(&self.registry);
            registry.jobs.push(job);
            registry.save().context("failed to save state")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
