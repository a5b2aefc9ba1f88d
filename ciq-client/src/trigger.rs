//! Build trigger over SSH
//!
//! Jenkins exposes a command interface over SSH. A build is started with
//! `build <job> -w [-p key=value]...`, which waits until the build has been
//! scheduled and answers `Started <job> #<build>`.

use async_trait::async_trait;
use ciq_core::domain::runner::Runner;
use reqwest::Url;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Port used when a runner has none configured
pub const SSH_FALLBACK_PORT: u16 = 22;

/// Key file used when a runner has none configured
pub const SSH_FALLBACK_KEY: &str = "id_rsa";

/// Starts builds on a CI server
#[async_trait]
pub trait BuildTrigger: Send + Sync {
    /// Starts one build and returns its build id
    ///
    /// # Arguments
    /// * `runner` - Server to start the build on
    /// * `job` - Job name
    /// * `options` - Build parameters
    async fn start_build(
        &self,
        runner: &Runner,
        job: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<String>;
}

/// Runs the system `ssh` binary against the server's command interface
#[derive(Debug, Clone, Default)]
pub struct SshTrigger {
    /// Home directory, relative key names resolve under `<home>/.ssh`
    home: Option<PathBuf>,
    /// Login used when the runner has no user
    login: Option<String>,
}

impl SshTrigger {
    pub fn new(home: Option<PathBuf>, login: Option<String>) -> Self {
        Self { home, login }
    }

    /// Reads `HOME` and `LOGNAME` from the environment
    pub fn from_env() -> Self {
        Self::new(
            std::env::var_os("HOME").map(PathBuf::from),
            std::env::var("LOGNAME").ok(),
        )
    }

    /// Builds the `ssh` argument list
    pub fn ssh_args(
        &self,
        runner: &Runner,
        job: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        let url = Url::parse(&runner.url)
            .map_err(|e| ClientError::start_failed(job, format!("bad runner URL: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::start_failed(job, "runner URL has no host"))?;

        let port = match runner.ssh_port {
            0 => SSH_FALLBACK_PORT,
            port => port,
        };

        let key = if runner.ssh_key.is_empty() {
            SSH_FALLBACK_KEY
        } else {
            runner.ssh_key.as_str()
        };
        let mut key_path = PathBuf::from(key);
        if key_path.is_relative() {
            let home = self.home.as_ref().ok_or_else(|| {
                ClientError::InvalidConfig("HOME is not set, cannot locate ssh key".to_string())
            })?;
            key_path = home.join(".ssh").join(key_path);
        }

        let user = match (runner.user.as_str(), self.login.as_deref()) {
            ("", Some(login)) if !login.is_empty() => login,
            ("", _) => {
                return Err(ClientError::InvalidConfig(
                    "ssh login user not defined".to_string(),
                ));
            }
            (user, _) => user,
        };

        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            port.to_string(),
            "-i".to_string(),
            key_path.display().to_string(),
            format!("{user}@{host}"),
            "build".to_string(),
            job.to_string(),
            "-w".to_string(),
        ];
        for (key, value) in options {
            args.push("-p".to_string());
            args.push(format!("{key}={value}"));
        }
        Ok(args)
    }
}

#[async_trait]
impl BuildTrigger for SshTrigger {
    async fn start_build(
        &self,
        runner: &Runner,
        job: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<String> {
        let args = self.ssh_args(runner, job, options)?;
        debug!("Running ssh {}", args.join(" "));

        let output = Command::new("ssh")
            .args(&args)
            .output()
            .await
            .map_err(|e| ClientError::start_failed(job, format!("failed to execute ssh: {e}")))?;

        let mut reply = String::from_utf8_lossy(&output.stdout).into_owned();
        reply.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ClientError::start_failed(
                job,
                format!("{}: {}", output.status, reply.trim()),
            ));
        }

        let build = parse_started(job, &reply)?;
        info!("Started {} #{} on {}", job, build, runner.url);
        Ok(build)
    }
}

/// Extracts the build id from a `Started <job> #<build>` reply
///
/// A reply naming another job is rejected: the server would have started
/// something else than what was asked for.
pub fn parse_started(job: &str, reply: &str) -> Result<String> {
    let started = reply
        .lines()
        .find_map(|line| line.trim().strip_prefix("Started "))
        .and_then(|rest| rest.rsplit_once(" #"));

    let Some((name, build)) = started else {
        return Err(ClientError::start_failed(
            job,
            format!("unexpected reply: {}", reply.trim()),
        ));
    };

    if build.is_empty() || !build.chars().all(|c| c.is_ascii_digit()) {
        return Err(ClientError::start_failed(
            job,
            format!("invalid build number in reply: {}", reply.trim()),
        ));
    }

    if name != job {
        return Err(ClientError::start_failed(
            job,
            format!("server started {name} instead"),
        ));
    }

    Ok(build.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> SshTrigger {
        SshTrigger::new(Some(PathBuf::from("/home/dev")), Some("dev".to_string()))
    }

    #[test]
    fn test_args_use_runner_settings() {
        let mut runner = Runner::new("https://ci.example.com:8443/jenkins");
        runner.user = "bot".to_string();
        let mut options = BTreeMap::new();
        options.insert("branch".to_string(), "main".to_string());
        options.insert("arch".to_string(), "x86_64".to_string());

        let args = trigger().ssh_args(&runner, "unit", &options).unwrap();

        assert_eq!(
            args,
            vec![
                "-o",
                "BatchMode=yes",
                "-p",
                "54410",
                "-i",
                "/home/dev/.ssh/id_rsa",
                "bot@ci.example.com",
                "build",
                "unit",
                "-w",
                "-p",
                "arch=x86_64",
                "-p",
                "branch=main",
            ]
        );
    }

    #[test]
    fn test_args_fallbacks() {
        let runner = Runner {
            url: "https://ci.example.com".to_string(),
            ssh_port: 0,
            ssh_key: "/keys/ci".to_string(),
            user: String::new(),
            insecure: false,
        };

        let args = trigger().ssh_args(&runner, "unit", &BTreeMap::new()).unwrap();

        assert_eq!(args[3], "22");
        assert_eq!(args[5], "/keys/ci");
        assert_eq!(args[6], "dev@ci.example.com");
    }

    #[test]
    fn test_missing_login_is_an_error() {
        let runner = Runner::new("https://ci.example.com");
        let trigger = SshTrigger::new(Some(PathBuf::from("/home/dev")), None);

        let err = trigger.ssh_args(&runner, "unit", &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("ssh login user not defined"));
    }

    #[test]
    fn test_parse_started() {
        assert_eq!(parse_started("unit", "Started unit #12\n").unwrap(), "12");
        assert_eq!(
            parse_started("unit", "Warning: banner\nStarted unit #7\nCompleted").unwrap(),
            "7"
        );
    }

    #[test]
    fn test_parse_started_rejects_other_job() {
        let err = parse_started("unit", "Started smoke #12").unwrap_err();
        assert_eq!(
            err.to_string(),
            "job unit start failed: server started smoke instead"
        );
    }

    #[test]
    fn test_parse_started_rejects_garbage() {
        assert!(parse_started("unit", "Permission denied (publickey).").is_err());
        assert!(parse_started("unit", "Started unit #").is_err());
        assert!(parse_started("unit", "Started unit #x1").is_err());
    }
}
