//! Post-query result selection
//!
//! The input must already be sorted by build within each (runner, job)
//! group; the window only ever looks one item back.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::filter::FailureMode;

/// Streaming selection state
#[derive(Debug)]
pub struct ResultWindow {
    mode: FailureMode,
    /// Oldest accepted start time, `None` when no window is set
    not_before: Option<DateTime<Utc>>,
    held: Option<JobStatus>,
}

impl ResultWindow {
    /// # Arguments
    /// * `mode` - Failure selection
    /// * `since` - Only builds started within this duration before `now`,
    ///   a zero duration sets no window
    /// * `now` - Reference time, normally the program start
    pub fn new(mode: FailureMode, since: Option<Duration>, now: DateTime<Utc>) -> Self {
        let not_before = since.filter(|since| !since.is_zero()).map(|since| {
            chrono::Duration::from_std(since)
                .ok()
                .and_then(|window| now.checked_sub_signed(window))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        Self {
            mode,
            not_before,
            held: None,
        }
    }

    fn within_window(&self, item: &JobStatus) -> bool {
        match self.not_before {
            None => true,
            Some(limit) => item.started_at().is_some_and(|started| started > limit),
        }
    }

    /// Feeds one item, returns the item to emit, if any
    pub fn push(&mut self, item: JobStatus) -> Option<JobStatus> {
        if !self.within_window(&item) {
            return None;
        }

        match self.mode {
            FailureMode::All => Some(item),
            FailureMode::AllFailed => item.is_failing().then_some(item),
            FailureMode::Failing => {
                let streak_ended = |prev: &JobStatus| {
                    !prev.job.same_group(&item.job) || !item.is_failing()
                };
                let out = self
                    .held
                    .take()
                    .filter(|prev| prev.is_failing() && streak_ended(prev));
                self.held = Some(item);
                out
            }
        }
    }

    /// Ends the stream, returns a still held failing item
    pub fn finish(&mut self) -> Option<JobStatus> {
        self.held.take().filter(JobStatus::is_failing)
    }
}

pub struct ResultFilter {
    window: ResultWindow,
    input: mpsc::Receiver<JobStatus>,
    output: mpsc::Sender<JobStatus>,
}

impl ResultFilter {
    pub fn new(
        window: ResultWindow,
        input: mpsc::Receiver<JobStatus>,
        output: mpsc::Sender<JobStatus>,
    ) -> Self {
        Self {
            window,
            input,
            output,
        }
    }
}

#[async_trait]
impl Stage for ResultFilter {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        while let Some(item) = ctx.recv(&mut self.input).await {
            if let Some(out) = self.window.push(item) {
                if !ctx.emit(&self.output, out).await {
                    return Ok(());
                }
            }
        }
        if ctx.is_aborted() {
            return Ok(());
        }
        if let Some(out) = self.window.finish() {
            ctx.emit(&self.output, out).await;
        }
        Ok(())
    }
}
