//! Runner command handlers
//!
//! Handles all runner-related CLI commands: adding, updating, removing and
//! listing the CI servers known to the registry.

use anyhow::{Result, bail};
use ciq_core::domain::runner::Runner;
use clap::{Args, Subcommand};
use colored::*;
use std::io::Write;

use super::Session;
use crate::render::{Fields, TabWriter};
use crate::stages::lock;

/// Runner subcommands
#[derive(Subcommand)]
pub enum RunnerCommands {
    /// Add a runner
    Add(RunnerArgs),
    /// Update a runner
    Update(RunnerArgs),
    /// Remove a runner
    Rm {
        /// Runner ID
        id: String,
    },
    /// List runners
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunnerArgs {
    /// Runner ID
    pub id: String,

    /// Jenkins URL
    #[arg(long)]
    pub url: Option<String>,

    /// Jenkins/SSH username
    #[arg(long)]
    pub user: Option<String>,

    /// Jenkins SSH port
    #[arg(long = "ssh-port")]
    pub ssh_port: Option<u16>,

    /// Jenkins SSH private key
    #[arg(long = "ssh-key")]
    pub ssh_key: Option<String>,

    /// Skip TLS server certificate validation
    #[arg(long, value_name = "BOOL")]
    pub insecure: Option<bool>,
}

impl RunnerArgs {
    /// Overwrites the fields given on the command line
    fn apply(&self, runner: &mut Runner) {
        if let Some(url) = &self.url {
            runner.url = url.clone();
        }
        if let Some(user) = &self.user {
            runner.user = user.clone();
        }
        if let Some(port) = self.ssh_port.filter(|p| *p != 0) {
            runner.ssh_port = port;
        }
        if let Some(key) = self.ssh_key.as_ref().filter(|k| !k.is_empty()) {
            runner.ssh_key = key.clone();
        }
        if let Some(insecure) = self.insecure {
            runner.insecure = insecure;
        }
    }
}

/// Handle runner commands
///
/// Routes runner subcommands to their respective handlers. Every change is
/// saved right away.
///
/// # Arguments
/// * `command` - The runner command to execute
/// * `session` - Registry and output
pub fn handle_runner_command(command: RunnerCommands, mut session: Session) -> Result<()> {
    match command {
        RunnerCommands::Add(args) => add_runner(&session, &args),
        RunnerCommands::Update(args) => update_runner(&session, &args),
        RunnerCommands::Rm { id } => remove_runner(&session, &id),
        RunnerCommands::List => list_runners(&mut session),
    }
}

fn add_runner(session: &Session, args: &RunnerArgs) -> Result<()> {
    {
        let mut registry = lock(&session.registry);
        if registry.runners.contains_key(&args.id) {
            bail!(
                "runner '{}' already exists, use the 'update' command",
                args.id
            );
        }
        let Some(url) = &args.url else {
            bail!("a new runner needs --url");
        };

        let mut runner = Runner::new(url.as_str());
        args.apply(&mut runner);
        registry.runners.insert(args.id.clone(), runner);
    }
    session.save()
}

fn update_runner(session: &Session, args: &RunnerArgs) -> Result<()> {
    {
        let mut registry = lock(&session.registry);
        let Some(runner) = registry.runners.get_mut(&args.id) else {
            bail!(
                "runner '{}' does not exist, use the 'add' command",
                args.id
            );
        };
        args.apply(runner);
    }
    session.save()
}

fn remove_runner(session: &Session, id: &str) -> Result<()> {
    if lock(&session.registry).runners.remove(id).is_none() {
        bail!("runner '{}' does not exist", id);
    }
    session.save()
}

/// Print the runners as a table
fn list_runners(session: &mut Session) -> Result<()> {
    let mut table = TabWriter::new(["NAME", "URL", "USER", "SSH-PORT", "SSH-KEY", "INSECURE"]);
    for (name, runner) in &lock(&session.registry).runners {
        table.push(&Fields::from([
            ("NAME", name.clone()),
            ("URL", runner.url.clone()),
            ("USER", runner.user.clone()),
            ("SSH-PORT", runner.ssh_port.to_string()),
            ("SSH-KEY", runner.ssh_key.clone()),
            ("INSECURE", runner.insecure.to_string()),
        ]));
    }

    if table.is_empty() {
        writeln!(session.out, "{}", "No runners registered.".yellow())?;
    } else {
        table.write_to(&mut session.out)?;
    }
    session.out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{TestSession, saved};
    use crate::stages::testing::FakeServer;
    use ciq_core::domain::runner::{DEFAULT_SSH_KEY, DEFAULT_SSH_PORT};

    fn args(id: &str) -> RunnerArgs {
        RunnerArgs {
            id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_uses_defaults() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        let add = RunnerArgs {
            url: Some("https://qa.example.com".into()),
            user: Some("bot".into()),
            ..args("qa")
        };

        handle_runner_command(RunnerCommands::Add(add), t.session).unwrap();

        let runner = &saved(&t.dir).runners["qa"];
        assert_eq!(runner.url, "https://qa.example.com");
        assert_eq!(runner.user, "bot");
        assert_eq!(runner.ssh_port, DEFAULT_SSH_PORT);
        assert_eq!(runner.ssh_key, DEFAULT_SSH_KEY);
        assert!(!runner.insecure);
    }

    #[test]
    fn test_add_existing_fails() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        let add = RunnerArgs {
            url: Some("https://ci.example.com".into()),
            ..args("ci")
        };

        let err = handle_runner_command(RunnerCommands::Add(add), t.session).unwrap_err();
        assert_eq!(
            err.to_string(),
            "runner 'ci' already exists, use the 'update' command"
        );
    }

    #[test]
    fn test_add_requires_url() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        let err = handle_runner_command(RunnerCommands::Add(args("qa")), t.session).unwrap_err();
        assert!(err.to_string().contains("--url"));
    }

    #[test]
    fn test_update_changes_given_fields_only() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        let update = RunnerArgs {
            ssh_port: Some(2222),
            insecure: Some(true),
            ..args("ci")
        };

        handle_runner_command(RunnerCommands::Update(update), t.session).unwrap();

        let runner = &saved(&t.dir).runners["ci"];
        assert_eq!(runner.url, "https://ci.example.com");
        assert_eq!(runner.ssh_port, 2222);
        assert!(runner.insecure);
    }

    #[test]
    fn test_update_and_remove_missing_fail() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        let err = handle_runner_command(RunnerCommands::Update(args("qa")), t.session).unwrap_err();
        assert!(err.to_string().contains("use the 'add' command"));

        let t = TestSession::new(FakeServer::default(), vec![]);
        let err = handle_runner_command(RunnerCommands::Rm { id: "qa".into() }, t.session)
            .unwrap_err();
        assert_eq!(err.to_string(), "runner 'qa' does not exist");
    }

    #[test]
    fn test_remove_runner() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        handle_runner_command(RunnerCommands::Rm { id: "ci".into() }, t.session).unwrap();
        assert!(saved(&t.dir).runners.is_empty());
    }

    #[test]
    fn test_list_runners() {
        let t = TestSession::new(FakeServer::default(), vec![]);
        let out = t.out.clone();

        handle_runner_command(RunnerCommands::List, t.session).unwrap();

        let text = out.text();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap().split_whitespace().collect::<Vec<_>>(),
            vec!["NAME", "URL", "USER", "SSH-PORT", "SSH-KEY", "INSECURE"]
        );
        assert_eq!(
            lines.next().unwrap().split_whitespace().collect::<Vec<_>>(),
            vec!["ci", "https://ci.example.com", "54410", "id_rsa", "false"]
        );
    }
}
