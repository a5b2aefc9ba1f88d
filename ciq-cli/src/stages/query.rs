//! Fan-out status query
//!
//! Queries the status of every incoming job on its runner. Up to `width`
//! queries run at once as short-lived worker tasks; each worker sends its
//! result straight to the stage output, so output order is unspecified.
//! All workers are joined before the stage returns, which keeps the output
//! open until the last result has been delivered or dropped.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use ciq_client::ServerPool;
use ciq_core::domain::job::Job;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Concurrent queries allowed by default
pub const DEFAULT_QUERY_WIDTH: usize = 10;

/// Width of the progress location text
const PROGRESS_LOCATION_WIDTH: usize = 40;

pub struct StatusQuery {
    servers: ServerPool,
    details: bool,
    progress: bool,
    width: usize,
    input: mpsc::Receiver<Job>,
    output: mpsc::Sender<JobStatus>,
}

impl StatusQuery {
    /// Creates the stage
    ///
    /// # Arguments
    /// * `servers` - Build servers by runner id
    /// * `details` - Fetch individual test cases
    /// * `input` - Jobs to query
    /// * `output` - One status per job
    pub fn new(
        servers: ServerPool,
        details: bool,
        input: mpsc::Receiver<Job>,
        output: mpsc::Sender<JobStatus>,
    ) -> Self {
        Self {
            servers,
            details,
            progress: false,
            width: DEFAULT_QUERY_WIDTH,
            input,
            output,
        }
    }

    /// Reports progress on stdout, only honoured when stdout is a terminal
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress && std::io::stdout().is_terminal();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Hands every job to a worker, stops at the first fatal error
    async fn dispatch(&mut self, ctx: &StageContext, workers: &mut JoinSet<()>) -> Result<()> {
        let slots = Arc::new(Semaphore::new(self.width));
        let mut index = 0usize;

        while let Some(job) = ctx.recv(&mut self.input).await {
            let server = self.servers.get(&job.runner)?;

            if self.progress {
                print_progress(index, &job);
            }
            index += 1;

            let permit = tokio::select! {
                biased;
                _ = ctx.aborted() => break,
                permit = slots.clone().acquire_owned() => permit?,
            };

            let output = self.output.clone();
            let abort = ctx.abort_signal().clone();
            let details = self.details;
            workers.spawn(async move {
                let _permit = permit;
                let status = match server.query_status(&job.name, &job.build, details).await {
                    Ok(status) => JobStatus::new(job, status),
                    Err(err) => JobStatus::failed(job, err.to_string()),
                };
                // a result finishing after an abort is dropped here
                abort.send(&output, status).await;
            });

            while let Some(done) = workers.try_join_next() {
                check_worker(done)?;
            }
        }

        debug!("Dispatched {} queries", index);
        Ok(())
    }
}

#[async_trait]
impl Stage for StatusQuery {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let mut workers = JoinSet::new();
        let dispatched = self.dispatch(ctx, &mut workers).await;

        if self.progress {
            clear_progress();
        }

        let mut joined = Ok(());
        while let Some(done) = workers.join_next().await {
            if let Err(err) = check_worker(done) {
                joined = Err(err);
            }
        }

        dispatched.and(joined)
    }
}

fn check_worker(done: std::result::Result<(), tokio::task::JoinError>) -> Result<()> {
    done.map_err(|err| {
        error!("Query worker failed: {}", err);
        anyhow!("query worker failed: {}", err)
    })
}

fn print_progress(index: usize, job: &Job) {
    let location: String = format!("{} {} {}", job.runner, job.name, job.build)
        .chars()
        .take(PROGRESS_LOCATION_WIDTH)
        .collect();
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{:6} {:<60}\r", index, location);
    let _ = stdout.flush();
}

fn clear_progress() {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{:6} {:<60}\r", "", "");
    let _ = stdout.flush();
}
