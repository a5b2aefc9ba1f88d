//! Streaming tab-separated output
//!
//! Used in no-sort mode: each result is written as soon as it arrives and
//! nothing is buffered, so memory stays flat on large queries.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::io::Write;
use tokio::sync::mpsc;

use super::{COLUMNS, status_fields};
use crate::stages::Output;

pub struct CsvRenderer {
    now: DateTime<Utc>,
    out: Output,
    input: mpsc::Receiver<JobStatus>,
}

impl CsvRenderer {
    pub fn new(out: Output, input: mpsc::Receiver<JobStatus>) -> Self {
        Self {
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
}

#[async_trait]
impl Stage for CsvRenderer {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let mut header_written = false;

        while let Some(result) = ctx.recv(&mut self.input).await {
            if !header_written {
                writeln!(self.out, "{}", COLUMNS.join("\t"))?;
                header_written = true;
            }
            let fields = status_fields(&result, self.now);
            let row: Vec<&str> = COLUMNS
                .iter()
                .map(|column| fields.get(column).map(String::as_str).unwrap_or_default())
                .collect();
            writeln!(self.out, "{}", row.join("\t"))?;
        }
        self.out.flush()?;
        Ok(())
    }
}
