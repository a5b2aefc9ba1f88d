//! Result renderers
//!
//! Terminal pipeline stages turning job statuses into text. Every renderer
//! writes to an [`Output`](crate::stages::Output) so tests can capture it.

mod csv;
mod json;
mod summary;
mod table;
mod template;

pub use csv::CsvRenderer;
pub use json::JsonRenderer;
pub use summary::SummaryRenderer;
pub use table::TableRenderer;
pub use template::TemplateRenderer;

use chrono::{DateTime, Local, TimeZone, Utc};
use ciq_core::domain::status::JobStatus;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

/// Columns of the result table, in display order
pub const COLUMNS: [&str; 16] = [
    "RUNNER",
    "JOB",
    "BUILD",
    "BUILDER",
    "USER",
    "BRANCH",
    "COMMIT-ID",
    "TAGS",
    "STATUS",
    "TIMESTAMP",
    "DURATION",
    "PASS",
    "SKIP",
    "FAIL",
    "URL",
    "ERROR",
];

/// Space between table columns
const COLUMN_PADDING: usize = 2;

/// Values of one result row keyed by column name
pub type Fields = BTreeMap<&'static str, String>;

/// Buffers rows and writes them as an aligned table
///
/// The header is only written together with the first row, so an empty
/// table produces no output at all.
#[derive(Debug, Default)]
pub struct TabWriter {
    columns: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl TabWriter {
    pub fn new(columns: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, taking each column's value from `fields`
    pub fn push(&mut self, fields: &Fields) {
        let row = self
            .columns
            .iter()
            .map(|column| fields.get(column).cloned().unwrap_or_default())
            .collect();
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the header and all buffered rows, then forgets the rows
    ///
    /// Every column except the last is padded to its widest cell plus two
    /// spaces.
    pub fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }

        let header: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        for row in std::iter::once(&header).chain(self.rows.iter()) {
            let last = row.len().saturating_sub(1);
            for (i, cell) in row.iter().enumerate() {
                if i == last {
                    write!(out, "{}", cell)?;
                } else {
                    write!(out, "{:<width$}", cell, width = widths[i] + COLUMN_PADDING)?;
                }
            }
            writeln!(out)?;
        }

        self.rows.clear();
        Ok(())
    }
}

/// Builds the table fields of one result
///
/// A result carrying an error only fills the job columns and ERROR.
///
/// # Arguments
/// * `result` - Queried job
/// * `now` - Reference time for the elapsed time of running builds
pub fn status_fields(result: &JobStatus, now: DateTime<Utc>) -> Fields {
    let job = &result.job;
    let mut fields = Fields::new();
    fields.insert("RUNNER", job.runner.clone());
    fields.insert("JOB", job.name.clone());
    fields.insert("BUILD", job.build.clone());
    fields.insert("TAGS", job.tags.join(","));

    if let Some(error) = &result.error {
        fields.insert("ERROR", error.clone());
        return fields;
    }
    let Some(status) = &result.status else {
        return fields;
    };

    fields.insert("BUILDER", status.built_on.clone());
    fields.insert("USER", status.user.clone().unwrap_or_default());
    if let Some(vcs) = &status.vcs {
        fields.insert("BRANCH", vcs.branch.clone());
        fields.insert("COMMIT-ID", vcs.commit_id.clone());
    }
    fields.insert("STATUS", status.state().to_string());
    fields.insert("TIMESTAMP", format_timestamp(status.timestamp));
    fields.insert("DURATION", format_build_duration(status.timestamp, status.duration, now));
    if let Some(report) = &status.test_report {
        fields.insert("PASS", format!("{:5}", report.pass_count));
        fields.insert("SKIP", format!("{:5}", report.skip_count));
        fields.insert("FAIL", format!("{:5}", report.fail_count));
    }
    fields.insert("URL", status.url.clone());
    fields
}

/// Local start time like `Mar  5 14:02:11`, empty when unknown
pub fn format_timestamp(millis: i64) -> String {
    if millis == 0 {
        return String::new();
    }
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%b %e %H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Build duration; a build still running shows its elapsed time with a `+`
fn format_build_duration(timestamp: i64, duration: i64, now: DateTime<Utc>) -> String {
    if duration != 0 {
        return humantime::format_duration(Duration::from_millis(duration.max(0) as u64))
            .to_string();
    }
    if timestamp == 0 {
        return String::new();
    }

    let started = timestamp.saturating_add(500).div_euclid(1000);
    let current = now.timestamp_millis().saturating_add(500).div_euclid(1000);
    let elapsed = Duration::from_secs(current.saturating_sub(started).max(0) as u64);
    format!("{}+", humantime::format_duration(elapsed))
}
