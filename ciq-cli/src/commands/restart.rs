//! Restart command
//!
//! registry → job filter → status query → sort → result filter → copier →
//! starter → recorder

use anyhow::Result;
use chrono::Utc;
use ciq_pipeline::{DEFAULT_CHANNEL_CAPACITY, Pipeline};
use clap::Args;
use tokio::sync::mpsc;

use super::run::StartArgs;
use super::{Session, handle_errors};
use crate::filter::FilterArgs;
use crate::stages::{
    JobCopier, JobFilter, JobSource, JobStarter, ResultFilter, ResultWindow, StartRecorder,
    StatusQuery, StatusSorter,
};

#[derive(Args, Debug, Clone, Default)]
pub struct RestartArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub start: StartArgs,
}

/// Handle the restart command
pub async fn handle_restart_command(args: RestartArgs, session: Session) -> Result<()> {
    let matcher = args.filter.matcher()?;
    let runners = session.runners();

    let (jobs_tx, jobs_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (selected_tx, selected_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (queried_tx, queried_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (sorted_tx, sorted_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (results_tx, results_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (copies_tx, copies_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (started_tx, started_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    let window = ResultWindow::new(args.filter.failure_mode(), None, Utc::now());

    let errors = Pipeline::builder()
        .stage(JobSource::new(session.jobs(), jobs_tx))
        .stage(JobFilter::new(matcher, jobs_rx, selected_tx))
        .stage(
            StatusQuery::new(session.servers, false, selected_rx, queried_tx)
                .with_width(session.query_width),
        )
        .stage(StatusSorter::new(queried_rx, sorted_tx))
        .stage(ResultFilter::new(window, sorted_rx, results_tx))
        .stage(JobCopier::new(
            args.start.options(),
            args.start.tags(),
            results_rx,
            copies_tx,
        ))
        .stage(JobStarter::new(runners, session.trigger, copies_rx, started_tx))
        .stage(StartRecorder::new(session.registry, session.out, started_rx))
        .start();
    handle_errors(errors).await
}
