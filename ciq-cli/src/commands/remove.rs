//! Remove command
//!
//! registry → job filter → status query → [sort] → result filter → remover

use anyhow::{Context, Result};
use chrono::Utc;
use ciq_pipeline::{DEFAULT_CHANNEL_CAPACITY, Pipeline};
use clap::Args;
use tokio::sync::mpsc;

use super::{Session, handle_errors};
use crate::filter::{FailureMode, FilterArgs};
use crate::stages::{
    JobFilter, JobRemover, JobSource, ResultFilter, ResultWindow, StatusQuery, StatusSorter, lock,
};

#[derive(Args, Debug, Clone, Default)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Handle the remove command
///
/// The registry is saved only when the whole pipeline succeeded.
pub async fn handle_remove_command(args: RemoveArgs, session: Session) -> Result<()> {
    let matcher = args.filter.matcher()?;
    let mode = args.filter.failure_mode();

    let (jobs_tx, jobs_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (selected_tx, selected_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (queried_tx, queried_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (sorter, sorted_rx) = if mode == FailureMode::Failing {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        (Some(StatusSorter::new(queried_rx, tx)), rx)
    } else {
        (None, queried_rx)
    };
    let (results_tx, results_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    let window = ResultWindow::new(mode, None, Utc::now());
    let jobs = session.jobs();
    let registry = session.registry.clone();
    let query = StatusQuery::new(session.servers, false, selected_rx, queried_tx)
        .with_width(session.query_width);

    let errors = Pipeline::builder()
        .stage(JobSource::new(jobs, jobs_tx))
        .stage(JobFilter::new(matcher, jobs_rx, selected_tx))
        .stage(query)
        .optional_stage(sorter)
        .stage(ResultFilter::new(window, sorted_rx, results_tx))
        .stage(JobRemover::new(session.registry, session.out, results_rx))
        .start();
    handle_errors(errors).await?;

    lock(&registry).save().context("failed to save state")
}
