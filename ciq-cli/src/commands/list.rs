//! List command
//!
//! registry or remote jobs → job filter → status query → [sort] →
//! result filter → renderer
//!
//! Without a renderer flag the results are printed as a table. A template
//! wins over every other output format.

use anyhow::Result;
use chrono::Utc;
use ciq_pipeline::{DEFAULT_CHANNEL_CAPACITY, Pipeline, Stage};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use super::{Session, handle_errors};
use crate::display::DisplayArgs;
use crate::filter::{FailureMode, FilterArgs};
use crate::render::{CsvRenderer, JsonRenderer, SummaryRenderer, TableRenderer, TemplateRenderer};
use crate::stages::{
    JobFilter, JobSource, RemoteJobSource, ResultFilter, ResultWindow, StatusQuery, StatusSorter,
    lock,
};

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// List jobs from the remote servers instead of the registry
    #[arg(long = "remote")]
    pub remote: bool,

    /// Render the output with the template at this path
    #[arg(
        long = "template-file",
        value_name = "PATH",
        conflicts_with_all = ["template", "json", "failed_summary"]
    )]
    pub template_file: Option<PathBuf>,

    /// Render the output with a named template from the registry directory
    #[arg(
        long = "template",
        value_name = "NAME",
        conflicts_with_all = ["json", "failed_summary"]
    )]
    pub template: Option<String>,
}

impl ListArgs {
    /// Sorting is required by the failing-streak filter and skipped in
    /// streaming or summary output otherwise
    fn sorted(&self) -> bool {
        self.filter.failure_mode() == FailureMode::Failing
            || !(self.display.no_sort || self.display.failed_summary)
    }

    /// Whether test cases have to be fetched
    fn details(&self) -> bool {
        self.display.wants_test_cases() || self.display.failed_summary
    }

    /// Template to render with, a named one lives next to the registry
    fn template_path(&self, registry_dir: &Path) -> Option<PathBuf> {
        match (&self.template, &self.template_file) {
            (Some(name), _) => Some(registry_dir.join(name)),
            (None, path) => path.clone(),
        }
    }
}

/// Handle the list command
///
/// # Arguments
/// * `args` - Filters and display options
/// * `session` - Registry, clients and output
pub async fn handle_list_command(args: ListArgs, session: Session) -> Result<()> {
    let matcher = args.filter.matcher()?;
    let sorted = args.sorted();
    let template = args.template_path(lock(&session.registry).dir());

    let (jobs_tx, jobs_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let source: Box<dyn Stage> = if args.remote {
        Box::new(RemoteJobSource::new(
            session.servers.clone(),
            matcher.clone(),
            jobs_tx,
        ))
    } else {
        Box::new(JobSource::new(session.jobs(), jobs_tx))
    };

    let (selected_tx, selected_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (queried_tx, queried_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let query = StatusQuery::new(session.servers, args.details(), selected_rx, queried_tx)
        .with_width(session.query_width)
        .with_progress(sorted);

    let (sorter, sorted_rx) = if sorted {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        (Some(StatusSorter::new(queried_rx, tx)), rx)
    } else {
        (None, queried_rx)
    };

    let (results_tx, results_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let now = Utc::now();
    let window = ResultWindow::new(args.filter.failure_mode(), args.display.since, now);

    let out = session.out;
    let renderer: Box<dyn Stage> = if let Some(path) = template {
        Box::new(TemplateRenderer::new(path, out, results_rx))
    } else if args.display.json {
        Box::new(JsonRenderer::new(out, results_rx))
    } else if args.display.failed_summary {
        Box::new(SummaryRenderer::new(out, results_rx))
    } else if args.display.no_sort {
        Box::new(CsvRenderer::new(out, results_rx).with_now(now))
    } else {
        Box::new(TableRenderer::new(args.display.clone(), out, results_rx).with_now(now))
    };

    let errors = Pipeline::builder()
        .slot(Some(source))
        .stage(JobFilter::new(matcher, jobs_rx, selected_tx))
        .stage(query)
        .optional_stage(sorter)
        .stage(ResultFilter::new(window, sorted_rx, results_tx))
        .slot(Some(renderer))
        .start();
    handle_errors(errors).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TestSession;
    use crate::stages::testing::FakeServer;
    use ciq_core::domain::job::Job;

    fn server() -> FakeServer {
        FakeServer::default()
            .with_build("unit", "1", "FAILURE")
            .with_build("unit", "2", "FAILURE")
            .with_build("unit", "3", "SUCCESS")
            .with_build("lint", "7", "FAILURE")
    }

    fn registry_jobs() -> Vec<Job> {
        ["3", "1", "2"]
            .into_iter()
            .map(|b| Job::new("ci", "unit").with_build(b))
            .chain([Job::new("ci", "lint").with_build("7")])
            .collect()
    }

    fn rows(text: &str) -> Vec<String> {
        text.lines()
            .skip(1)
            .map(|l| l.split_whitespace().take(4).collect::<Vec<_>>().join(" "))
            .collect()
    }

    #[tokio::test]
    async fn test_lists_registry_sorted() {
        let t = TestSession::new(server(), registry_jobs());
        let out = t.out.clone();

        handle_list_command(ListArgs::default(), t.session).await.unwrap();

        assert_eq!(
            rows(&out.text()),
            vec![
                "ci lint 7 FAILURE",
                "ci unit 1 FAILURE",
                "ci unit 2 FAILURE",
                "ci unit 3 SUCCESS",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_reports_streak_ends() {
        let t = TestSession::new(server(), registry_jobs());
        let out = t.out.clone();
        let args = ListArgs {
            filter: FilterArgs {
                failing: true,
                ..Default::default()
            },
            ..Default::default()
        };

        handle_list_command(args, t.session).await.unwrap();

        assert_eq!(rows(&out.text()), vec!["ci lint 7 FAILURE", "ci unit 2 FAILURE"]);
    }

    #[tokio::test]
    async fn test_remote_json() {
        let t = TestSession::new(server(), vec![]);
        let out = t.out.clone();
        let args = ListArgs {
            filter: FilterArgs {
                jobs: vec!["lint".into()],
                ..Default::default()
            },
            display: DisplayArgs {
                json: true,
                ..Default::default()
            },
            remote: true,
            ..Default::default()
        };

        handle_list_command(args, t.session).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["job"]["name"], "lint");
    }

    #[tokio::test]
    async fn test_unknown_runner_fails_the_command() {
        let jobs = vec![Job::new("gone", "unit").with_build("1")];
        let t = TestSession::new(server(), jobs);

        let err = handle_list_command(ListArgs::default(), t.session)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "there were 1 errors");
    }

    #[tokio::test]
    async fn test_named_template_next_to_registry() {
        let t = TestSession::new(server(), registry_jobs());
        std::fs::write(
            t.dir.path().join("builds.tmpl"),
            "{% for t in tasks %}{{ t.job.name }} {{ t.job.build }}\n{% endfor %}",
        )
        .unwrap();
        let out = t.out.clone();
        let args = ListArgs {
            template: Some("builds.tmpl".into()),
            ..Default::default()
        };

        handle_list_command(args, t.session).await.unwrap();

        assert_eq!(out.text(), "lint 7\nunit 1\nunit 2\nunit 3\n");
    }

    #[test]
    fn test_template_name_resolves_in_registry_dir() {
        let args = ListArgs {
            template: Some("short.tmpl".into()),
            ..Default::default()
        };
        assert_eq!(
            args.template_path(Path::new("/home/dev/.ciq")),
            Some(PathBuf::from("/home/dev/.ciq/short.tmpl"))
        );

        let args = ListArgs {
            template_file: Some("report.tmpl".into()),
            ..Default::default()
        };
        assert_eq!(
            args.template_path(Path::new("/home/dev/.ciq")),
            Some(PathBuf::from("report.tmpl"))
        );
        assert_eq!(ListArgs::default().template_path(Path::new(".")), None);
    }
}
