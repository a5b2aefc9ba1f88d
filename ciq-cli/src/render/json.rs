//! JSON output

use anyhow::{Context, Result};
use async_trait::async_trait;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use std::io::Write;
use tokio::sync::mpsc;

use crate::stages::Output;

/// Prints all results as one pretty-printed JSON array
///
/// The array is written even when there are no results.
pub struct JsonRenderer {
    out: Output,
    input: mpsc::Receiver<JobStatus>,
}

impl JsonRenderer {
    pub fn new(out: Output, input: mpsc::Receiver<JobStatus>) -> Self {
        Self { out, input }
    }
}

#[async_trait]
impl Stage for JsonRenderer {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let mut results = Vec::new();
        while let Some(result) = ctx.recv(&mut self.input).await {
            results.push(result);
        }
        if ctx.is_aborted() {
            return Ok(());
        }

        serde_json::to_writer_pretty(&mut self.out, &results)
            .context("failed to write JSON output")?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{Captured, feed, status};
    use ciq_pipeline::Pipeline;

    async fn rendered(results: Vec<JobStatus>) -> String {
        let out = Captured::default();
        let errors = Pipeline::builder()
            .stage(JsonRenderer::new(out.boxed(), feed(results)))
            .start()
            .collect()
            .await;
        assert!(errors.is_empty());
        out.text()
    }

    #[tokio::test]
    async fn test_results_as_array() {
        let text = rendered(vec![status("ci", "unit", "3", "FAILURE")]).await;

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["job"]["runner"], "ci");
        assert_eq!(value[0]["job"]["build"], "3");
        assert_eq!(value[0]["status"]["result"], "FAILURE");
        assert!(value[0]["error"].is_null());
    }

    #[tokio::test]
    async fn test_empty_array() {
        assert_eq!(rendered(Vec::new()).await.trim(), "[]");
    }
}
