//! User template output
//!
//! Renders every collected result through a Jinja-style template. The
//! template sees one variable, `tasks`, the list of results in arrival
//! order with the same shape as the JSON output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ciq_core::domain::status::JobStatus;
use ciq_pipeline::{Stage, StageContext};
use minijinja::{Environment, context};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::stages::Output;

pub struct TemplateRenderer {
    path: PathBuf,
    out: Output,
    input: mpsc::Receiver<JobStatus>,
}

impl TemplateRenderer {
    /// # Arguments
    /// * `path` - Template file, read when the stage starts
    /// * `out` - Destination of the rendered text
    /// * `input` - Results to render
    pub fn new(path: PathBuf, out: Output, input: mpsc::Receiver<JobStatus>) -> Self {
        Self { path, out, input }
    }
}

#[async_trait]
impl Stage for TemplateRenderer {
    async fn run(&mut self, ctx: &StageContext) -> Result<()> {
        let source = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read template {}", self.path.display()))?;
        let env = Environment::new();
        let template = env
            .template_from_str(&source)
            .with_context(|| format!("invalid template {}", self.path.display()))?;

        let mut tasks = Vec::new();
        while let Some(result) = ctx.recv(&mut self.input).await {
            tasks.push(result);
        }
        if ctx.is_aborted() {
            return Ok(());
        }

        let text = template
            .render(context! { tasks => tasks })
            .with_context(|| format!("failed to render template {}", self.path.display()))?;
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{Captured, feed, status};
    use ciq_pipeline::Pipeline;

    fn template(dir: &tempfile::TempDir, source: &str) -> PathBuf {
        let path = dir.path().join("report.tmpl");
        std::fs::write(&path, source).unwrap();
        path
    }

    #[tokio::test]
    async fn test_renders_every_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = template(
            &dir,
            "{% for t in tasks %}{{ t.job.name }}#{{ t.job.build }}={{ t.status.result }}\n{% endfor %}",
        );
        let out = Captured::default();
        let input = feed(vec![
            status("ci", "unit", "1", "FAILURE"),
            status("ci", "lint", "7", "SUCCESS"),
        ]);

        let errors = Pipeline::builder()
            .stage(TemplateRenderer::new(path, out.boxed(), input))
            .start()
            .collect()
            .await;

        assert!(errors.is_empty());
        assert_eq!(out.text(), "unit#1=FAILURE\nlint#7=SUCCESS\n");
    }

    #[tokio::test]
    async fn test_syntax_error_aborts_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = template(&dir, "{% for t in tasks %}{{ t.job.name }}");
        let out = Captured::default();

        let errors = Pipeline::builder()
            .stage(TemplateRenderer::new(path, out.boxed(), feed(vec![])))
            .start()
            .collect()
            .await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("invalid template"));
        assert_eq!(out.text(), "");
    }

    #[tokio::test]
    async fn test_render_error_aborts_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = template(&dir, "{{ tasks | no_such_filter }}");
        let out = Captured::default();

        let errors = Pipeline::builder()
            .stage(TemplateRenderer::new(
                path,
                out.boxed(),
                feed(vec![status("ci", "unit", "1", "SUCCESS")]),
            ))
            .start()
            .collect()
            .await;

        assert_eq!(errors.len(), 1);
        assert_eq!(out.text(), "");
    }

    #[tokio::test]
    async fn test_missing_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = Captured::default();

        let errors = Pipeline::builder()
            .stage(TemplateRenderer::new(
                dir.path().join("absent.tmpl"),
                out.boxed(),
                feed(vec![]),
            ))
            .start()
            .collect()
            .await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("failed to read template"));
    }
}
