//! Failed test summary

use anyhow::Result;
use async_trait::async_trait;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::collections::HashMap;
use std::io::Write;
use tokio::sync::mpsc;

use super::{Fields, TabWriter};
use crate::stages::Output;

/// Counts failing test cases by (class, test) over all results
pub struct SummaryRenderer {
    out: Output,
    input: mpsc::Receiver<JobStatus>,
}

impl SummaryRenderer {
    pub fn new(out: Output, input: mpsc::Receiver<JobStatus>) -> Self {
        Self { out, input }
    }
}

/// Failure counts, most frequent first, then by class and test name
pub fn failure_counts<'a>(
    results: impl IntoIterator<Item = &'a JobStatus>,
) -> Vec<(usize, String, String)> {
    let mut counts: HashMap<(String, String), usize> = HashMap::new();
    for result in results {
        let Some(report) = result.status.as_ref().and_then(|s| s.test_report.as_ref()) else {
            continue;
        };
        for case in report.failing_cases() {
            *counts
                .entry((case.class_name.clone(), case.name.clone()))
                .or_default() += 1;
        }
    }

    let mut sorted: Vec<(usize, String, String)> = counts
        .into_iter()
        .map(|((class, test), count)| (count, class, test))
        .collect();
    sorted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| (&a.1, &a.2).cmp(&(&b.1, &b.2))));
    sorted
}

#[async_trait]
impl Stage for SummaryRenderer {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let mut results = Vec::new();
        while let Some(result) = ctx.recv(&mut self.input).await {
            results.push(result);
        }
        if ctx.is_aborted() {
            return Ok(());
        }

        let mut table = TabWriter::new(["COUNT", "CLASS", "TEST"]);
        for (count, class, test) in failure_counts(&results) {
            table.push(&Fields::from([
                ("COUNT", count.to_string()),
                ("CLASS", class),
                ("TEST", test),
            ]));
        }
        table.write_to(&mut self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::status;
    use ciq_core::domain::status::{TestCase, TestReport, TestSuite};

    fn failing(build: &str, tests: &[(&str, &str)]) -> JobStatus {
        let mut result = status("ci", "unit", build, "UNSTABLE");
        let cases = tests
            .iter()
            .map(|(class, name)| TestCase {
                status: "FAILED".into(),
                name: name.to_string(),
                class_name: class.to_string(),
                ..Default::default()
            })
            .collect();
        if let Some(status) = result.status.as_mut() {
            status.test_report = Some(TestReport {
                suites: vec![TestSuite { cases }],
                ..Default::default()
            });
        }
        result
    }

    #[test]
    fn test_most_frequent_first() {
        let results = vec![
            failing("1", &[("b.Suite", "flaky"), ("a.Suite", "once")]),
            failing("2", &[("b.Suite", "flaky"), ("a.Suite", "other")]),
            status("ci", "unit", "3", "SUCCESS"),
        ];

        let counts = failure_counts(&results);

        assert_eq!(
            counts,
            vec![
                (2, "b.Suite".to_string(), "flaky".to_string()),
                (1, "a.Suite".to_string(), "once".to_string()),
                (1, "a.Suite".to_string(), "other".to_string()),
            ]
        );
    }

    #[test]
    fn test_passing_cases_are_not_counted() {
        let mut result = failing("1", &[("a.Suite", "broken")]);
        if let Some(report) = result.status.as_mut().and_then(|s| s.test_report.as_mut()) {
            report.suites[0].cases.push(TestCase {
                status: "PASSED".into(),
                name: "fine".into(),
                class_name: "a.Suite".into(),
                ..Default::default()
            });
        }
        assert_eq!(failure_counts([&result]).len(), 1);
    }
}
