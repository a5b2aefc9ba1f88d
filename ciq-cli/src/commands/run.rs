//! Run command
//!
//! N copies of one job → starter → recorder

use anyhow::{Result, bail};
use ciq_core::domain::job::Job;
use ciq_pipeline::{DEFAULT_CHANNEL_CAPACITY, Pipeline};
use clap::Args;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use super::{Session, expand_tags, handle_errors};
use crate::filter::parse_key_val;
use crate::stages::{JobSource, JobStarter, StartRecorder};

/// Options and tags given to started builds
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Set option for the build: 'key:value'
    #[arg(short = 'O', long = "set-option", value_name = "KEY:VALUE", value_parser = parse_key_val)]
    pub set_options: Vec<(String, String)>,

    /// Set tags for the build
    #[arg(short = 'T', long = "set-tag", value_name = "TAG[,TAG]")]
    pub set_tags: Vec<String>,
}

impl StartArgs {
    pub fn options(&self) -> BTreeMap<String, String> {
        self.set_options.iter().cloned().collect()
    }

    pub fn tags(&self) -> Vec<String> {
        expand_tags(&self.set_tags)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Runner ID
    pub runner: String,

    /// Name of the job to run
    pub job: String,

    #[command(flatten)]
    pub start: StartArgs,

    /// Number of builds to start
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    pub count: usize,
}

/// Handle the run command
pub async fn handle_run_command(args: RunArgs, session: Session) -> Result<()> {
    let runners = session.runners();
    if !runners.contains_key(&args.runner) {
        bail!(
            "runner '{}' does not exist, use the 'runner add' command",
            args.runner
        );
    }

    let job = Job::new(args.runner, args.job)
        .with_options(args.start.options())
        .with_tags(args.start.tags());
    let jobs = vec![job; args.count];

    let (jobs_tx, jobs_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (started_tx, started_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    let errors = Pipeline::builder()
        .stage(JobSource::new(jobs, jobs_tx))
        .stage(JobStarter::new(runners, session.trigger, jobs_rx, started_tx))
        .stage(StartRecorder::new(session.registry, session.out, started_rx))
        .start();
    handle_errors(errors).await
}
