//! Pipeline assembly and error collection
//!
//! The orchestrator links each stage to the abort flag of the stage before
//! it, spawns one task per stage and hands the caller a [`PipelineErrors`]
//! stream. The stream ends once every stage has reported completion.

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::abort::AbortSignal;
use crate::stage::{Stage, StageContext, StageEvent};

/// A stage waiting to be started
pub(crate) struct StageNode {
    stage: Box<dyn Stage>,
    abort: AbortSignal,
    ctx: Option<StageContext>,
}

impl StageNode {
    pub(crate) fn new(stage: Box<dyn Stage>) -> Self {
        Self {
            stage,
            abort: AbortSignal::new(),
            ctx: None,
        }
    }

    /// Wires the stage into a pipeline
    ///
    /// # Panics
    /// Initializing a stage twice is a programming error.
    pub(crate) fn init(
        &mut self,
        upstream: Option<AbortSignal>,
        events: mpsc::UnboundedSender<StageEvent>,
    ) {
        assert!(
            self.ctx.is_none(),
            "stage {} has already been initialized",
            self.stage.name()
        );
        self.ctx = Some(StageContext::new(
            self.stage.name().to_string(),
            self.abort.clone(),
            upstream,
            events,
        ));
    }

    /// Spawns the stage task
    ///
    /// The stage runs in a nested task so a panic is caught and reported as
    /// an error. Either way the stage is dropped, closing its output, before
    /// completion is reported.
    ///
    /// # Panics
    /// Launching a stage that was never initialized is a programming error.
    fn launch(self) {
        let Some(ctx) = self.ctx else {
            panic!("stage {} launched without init", self.stage.name());
        };
        let mut stage = self.stage;

        tokio::spawn(async move {
            debug!("Stage {} started", ctx.name());

            let worker_ctx = ctx.clone();
            let outcome = tokio::spawn(async move { stage.run(&worker_ctx).await }).await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => ctx.abort_with_error(err),
                Err(join_err) => {
                    ctx.abort_with_error(anyhow!("stage {} panicked: {}", ctx.name(), join_err))
                }
            }

            debug!("Stage {} finished", ctx.name());
            ctx.finish();
        });
    }
}

/// Entry point for building pipelines
pub struct Pipeline;

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Starts the non-empty slots in order
    ///
    /// Empty slots let callers keep the shape of a pipeline while leaving out
    /// stages that do not apply.
    pub fn start<I>(slots: I) -> PipelineErrors
    where
        I: IntoIterator<Item = Option<Box<dyn Stage>>>,
    {
        slots
            .into_iter()
            .fold(Pipeline::builder(), PipelineBuilder::slot)
            .start()
    }
}

/// Collects stages, first producer to last consumer
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<StageNode>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(StageNode::new(Box::new(stage)));
        self
    }

    /// Adds `stage` when present, does nothing otherwise
    pub fn optional_stage<S: Stage>(self, stage: Option<S>) -> Self {
        match stage {
            Some(stage) => self.stage(stage),
            None => self,
        }
    }

    pub fn slot(mut self, slot: Option<Box<dyn Stage>>) -> Self {
        if let Some(stage) = slot {
            self.stages.push(StageNode::new(stage));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Starts every stage and returns the error stream
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> PipelineErrors {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut nodes = self.stages;

        let mut upstream = None;
        for node in &mut nodes {
            node.init(upstream.take(), events_tx.clone());
            upstream = Some(node.abort.clone());
        }
        drop(events_tx);

        let remaining = nodes.len();
        debug!("Starting pipeline with {} stages", remaining);
        for node in nodes {
            node.launch();
        }

        PipelineErrors {
            events: events_rx,
            remaining,
        }
    }
}

/// Errors reported by a running pipeline
///
/// Each error is yielded as soon as its stage reports it. `recv` returns
/// `None` only after every stage has finished.
#[derive(Debug)]
pub struct PipelineErrors {
    events: mpsc::UnboundedReceiver<StageEvent>,
    remaining: usize,
}

impl PipelineErrors {
    /// Waits for the next error
    ///
    /// # Panics
    /// Panics when the event queue closes while stages are still
    /// unaccounted for, which means a stage task vanished without reporting
    /// completion.
    pub async fn recv(&mut self) -> Option<anyhow::Error> {
        while self.remaining > 0 {
            match self.events.recv().await {
                Some(StageEvent::Failed(err)) => return Some(err),
                Some(StageEvent::Finished { stage }) => {
                    self.remaining -= 1;
                    debug!("{} done, {} stages left", stage, self.remaining);
                }
                None => {
                    error!(
                        "Stage event queue closed with {} stages unaccounted for",
                        self.remaining
                    );
                    panic!(
                        "pipeline event queue closed with {} stages still running",
                        self.remaining
                    );
                }
            }
        }
        None
    }

    /// Waits for the whole pipeline and returns every error
    pub async fn collect(mut self) -> Vec<anyhow::Error> {
        let mut errors = Vec::new();
        while let Some(err) = self.recv().await {
            errors.push(err);
        }
        errors
    }
}
