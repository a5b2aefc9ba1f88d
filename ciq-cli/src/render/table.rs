//! Default table output

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ciq_core::domain::status::{JobStatus, TestCase};
use ciq_pipeline::{Stage, StageContext};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{COLUMNS, Fields, TabWriter, status_fields};
use crate::display::DisplayArgs;
use crate::stages::Output;

const CASE_COLUMNS: [&str; 7] = ["RUNNER", "JOB", "BUILD", "RESULT", "ELAPSED", "CLASS", "TEST"];

/// Prints the result table, followed by the failing test cases when asked
///
/// Results are buffered until the input closes so that columns line up.
pub struct TableRenderer {
    display: DisplayArgs,
    now: DateTime<Utc>,
    out: Output,
    input: mpsc::Receiver<JobStatus>,
}

impl TableRenderer {
    pub fn new(display: DisplayArgs, out: Output, input: mpsc::Receiver<JobStatus>) -> Self {
        Self {
            display,
            now: Utc::now(),
            out,
            input,
        }
    }

    /// Reference time for the duration of running builds
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn write_cases(&mut self, results: &[JobStatus]) -> Result<()> {
        let mut table = TabWriter::new(CASE_COLUMNS);
        let mut blocks = Vec::new();

        for result in results {
            let Some(report) = result.status.as_ref().and_then(|s| s.test_report.as_ref()) else {
                continue;
            };
            for case in report.failing_cases() {
                table.push(&case_fields(result, case));
                if self.display.test_traceback || self.display.test_output {
                    blocks.push((result, case));
                }
            }
        }

        if table.is_empty() {
            return Ok(());
        }
        writeln!(self.out)?;
        table.write_to(&mut self.out)?;

        for (result, case) in blocks {
            writeln!(
                self.out,
                "\n{} {} ({})",
                case.class_name, case.name, result.job
            )?;
            if self.display.test_traceback {
                let trace = case.error_stack_trace.as_deref().unwrap_or_default();
                writeln!(self.out, "STACK TRACE:\n{}", trace)?;
            }
            if self.display.test_output {
                if let Some(stdout) = case.stdout.as_deref().filter(|s| !s.is_empty()) {
                    writeln!(self.out, "STDOUT:\n{}", stdout)?;
                }
                if let Some(stderr) = case.stderr.as_deref().filter(|s| !s.is_empty()) {
                    writeln!(self.out, "STDERR:\n{}", stderr)?;
                }
            }
        }
        Ok(())
    }
}

fn case_fields(result: &JobStatus, case: &TestCase) -> Fields {
    let elapsed = Duration::from_secs(case.duration.max(0.0) as u64);
    Fields::from([
        ("RUNNER", result.job.runner.clone()),
        ("JOB", result.job.name.clone()),
        ("BUILD", result.job.build.clone()),
        ("RESULT", case.status.clone()),
        ("ELAPSED", humantime::format_duration(elapsed).to_string()),
        ("CLASS", case.class_name.clone()),
        ("TEST", case.name.clone()),
    ])
}

#[async_trait]
impl Stage for TableRenderer {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let columns = COLUMNS.into_iter().filter(|c| self.display.shows(c));
        let mut table = TabWriter::new(columns);
        let keep_cases = self.display.wants_test_cases();
        let mut detailed = Vec::new();

        while let Some(result) = ctx.recv(&mut self.input).await {
            table.push(&status_fields(&result, self.now));
            if keep_cases {
                detailed.push(result);
            }
        }
        if ctx.is_aborted() {
            return Ok(());
        }

        table.write_to(&mut self.out)?;
        if keep_cases {
            self.write_cases(&detailed)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{Captured, feed, status};
    use ciq_core::domain::status::{TestReport, TestSuite};
    use ciq_pipeline::Pipeline;

    fn case(status: &str, name: &str, trace: &str) -> TestCase {
        TestCase {
            status: status.into(),
            name: name.into(),
            class_name: "pkg.Suite".into(),
            duration: 2.7,
            error_stack_trace: Some(trace.into()),
            stdout: Some(String::new()),
            stderr: Some("boom".into()),
        }
    }

    fn with_cases(mut result: JobStatus, cases: Vec<TestCase>) -> JobStatus {
        if let Some(status) = result.status.as_mut() {
            status.test_report = Some(TestReport {
                pass_count: 10,
                skip_count: 0,
                fail_count: cases.len() as i64,
                suites: vec![TestSuite { cases }],
            });
        }
        result
    }

    async fn rendered(display: DisplayArgs, results: Vec<JobStatus>) -> String {
        let out = Captured::default();
        let errors = Pipeline::builder()
            .stage(TableRenderer::new(display, out.boxed(), feed(results)))
            .start()
            .collect()
            .await;
        assert!(errors.is_empty());
        out.text()
    }

    #[tokio::test]
    async fn test_hides_optional_columns() {
        let text = rendered(
            DisplayArgs::default(),
            vec![status("ci", "unit", "1", "SUCCESS")],
        )
        .await;

        let header = text.lines().next().unwrap();
        assert!(header.starts_with("RUNNER  JOB   BUILD  STATUS"));
        assert!(header.ends_with("ERROR"));
        assert!(!header.contains("URL"));
        assert!(!header.contains("BUILDER"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_running_build_elapsed_from_reference_time() {
        let mut result = status("ci", "unit", "5", "");
        let started = result.started_at().unwrap();
        result.status.as_mut().unwrap().duration = 0;

        let out = Captured::default();
        let renderer = TableRenderer::new(DisplayArgs::default(), out.boxed(), feed(vec![result]))
            .with_now(started + chrono::Duration::seconds(90));
        let errors = Pipeline::builder().stage(renderer).start().collect().await;

        assert!(errors.is_empty());
        assert!(out.text().contains("1m 30s+"));
    }

    #[tokio::test]
    async fn test_no_results_prints_nothing() {
        assert_eq!(rendered(DisplayArgs::default(), vec![]).await, "");
    }

    #[tokio::test]
    async fn test_case_table_with_traces() {
        let display = DisplayArgs {
            test_details: true,
            test_traceback: true,
            test_output: true,
            ..Default::default()
        };
        let result = with_cases(
            status("ci", "unit", "4", "UNSTABLE"),
            vec![
                case("FAILED", "test_login", "AssertionError"),
                case("PASSED", "test_logout", ""),
            ],
        );

        let text = rendered(display, vec![result]).await;

        assert!(text.contains("\nRUNNER  JOB   BUILD  RESULT  ELAPSED  CLASS      TEST\n"));
        assert!(text.contains("ci      unit  4      FAILED  2s       pkg.Suite  test_login\n"));
        assert!(!text.contains("test_logout"));
        assert!(text.contains("pkg.Suite test_login (ci unit 4)\nSTACK TRACE:\nAssertionError\n"));
        assert!(text.contains("STDERR:\nboom\n"));
        assert!(!text.contains("STDOUT:"));
    }

    #[tokio::test]
    async fn test_cases_without_detail_flags_are_not_shown() {
        let result = with_cases(
            status("ci", "unit", "4", "UNSTABLE"),
            vec![case("FAILED", "test_login", "AssertionError")],
        );
        let text = rendered(DisplayArgs::default(), vec![result]).await;
        assert!(!text.contains("test_login"));
    }
}
