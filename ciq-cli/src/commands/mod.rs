//! Commands module
//!
//! Defines all CLI commands and their handlers. Every job command is a
//! pipeline of stages from [`crate::stages`] ending in a renderer or a
//! registry writer.

mod clear;
mod list;
mod remove;
mod restart;
mod run;
mod runner;

pub use list::ListArgs;
pub use remove::RemoveArgs;
pub use restart::RestartArgs;
pub use run::RunArgs;
pub use runner::RunnerCommands;

use anyhow::{Context, Result, bail};
use ciq_client::{BuildTrigger, ServerPool, SshTrigger};
use ciq_core::domain::job::Job;
use ciq_core::domain::runner::Runner;
use ciq_pipeline::PipelineErrors;
use clap::Subcommand;
use colored::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::config::{self, Config};
use crate::stages::{Output, SharedRegistry, lock};

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List jobs and the results of their builds
    List(ListArgs),
    /// Start builds of a job
    Run(RunArgs),
    /// Start copies of the selected builds
    Restart(RestartArgs),
    /// Remove the selected builds from the registry
    Remove(RemoveArgs),
    /// Remove every job from the registry
    Clear,
    /// Runner management
    Runner {
        #[command(subcommand)]
        command: RunnerCommands,
    },
}

/// Everything a command works with
///
/// Built once per invocation from the [`Config`]; tests assemble it from
/// fakes instead.
pub struct Session {
    pub registry: SharedRegistry,
    pub servers: ServerPool,
    pub trigger: Arc<dyn BuildTrigger>,
    pub query_width: usize,
    pub out: Output,
}

impl Session {
    /// Loads the registry and connects a client to each of its runners
    pub fn open(config: &Config) -> Result<Self> {
        let registry = config.load_registry()?;
        let cache_dir = config::cache_dir(&registry);
        let servers = ServerPool::from_runners(&registry.runners, &config.limits, Some(&cache_dir))
            .context("failed to set up CI clients")?;

        Ok(Self {
            registry: Arc::new(Mutex::new(registry)),
            servers,
            trigger: Arc::new(SshTrigger::from_env()),
            query_width: config.query_width,
            out: Box::new(std::io::stdout()),
        })
    }

    /// Registry jobs at this moment, in registry order
    fn jobs(&self) -> Vec<Job> {
        lock(&self.registry).jobs.clone()
    }

    fn runners(&self) -> BTreeMap<String, Runner> {
        lock(&self.registry).runners.clone()
    }

    fn save(&self) -> Result<()> {
        lock(&self.registry).save().context("failed to save state")
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `session` - Registry, clients and output of this invocation
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, session: Session) -> Result<()> {
    match command {
        Commands::List(args) => list::handle_list_command(args, session).await,
        Commands::Run(args) => run::handle_run_command(args, session).await,
        Commands::Restart(args) => restart::handle_restart_command(args, session).await,
        Commands::Remove(args) => remove::handle_remove_command(args, session).await,
        Commands::Clear => clear::handle_clear_command(session),
        Commands::Runner { command } => runner::handle_runner_command(command, session),
    }
}

/// Prints every pipeline error as it arrives
///
/// # Returns
/// An error carrying the count when any stage failed
pub async fn handle_errors(mut errors: PipelineErrors) -> Result<()> {
    let mut count = 0;
    while let Some(err) = errors.recv().await {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        count += 1;
    }
    if count > 0 {
        bail!("there were {} errors", count);
    }
    Ok(())
}

/// Splits comma separated tag arguments
pub fn expand_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|tag| tag.split(','))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
