//! Stage trait and the per-stage runtime context

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::abort::AbortSignal;

/// A unit of work in a pipeline
///
/// A stage owns its input receiver and output sender. The runtime drops the
/// stage as soon as [`Stage::run`] returns, which closes its output and lets
/// the next stage drain and finish.
#[async_trait]
pub trait Stage: Send + 'static {
    /// Name used in logs and panic reports
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Runs the stage to completion
    ///
    /// # Arguments
    /// * `ctx` - The stage context, used to send, receive and watch aborts
    ///
    /// # Returns
    /// An error aborts the upstream stage and is reported to the caller. The
    /// stage must stop producing once its abort flag is raised.
    async fn run(&mut self, ctx: &StageContext) -> anyhow::Result<()>;
}

/// Messages from stage tasks to the pipeline's collector
#[derive(Debug)]
pub(crate) enum StageEvent {
    Failed(anyhow::Error),
    Finished { stage: String },
}

/// Runtime handle given to a running stage
#[derive(Debug, Clone)]
pub struct StageContext {
    name: String,
    abort: AbortSignal,
    upstream: Option<AbortSignal>,
    events: mpsc::UnboundedSender<StageEvent>,
}

impl StageContext {
    pub(crate) fn new(
        name: String,
        abort: AbortSignal,
        upstream: Option<AbortSignal>,
        events: mpsc::UnboundedSender<StageEvent>,
    ) -> Self {
        Self {
            name,
            abort,
            upstream,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// This stage's own abort flag, raised by the stage after it
    ///
    /// Clone it into helper tasks that produce output on the stage's behalf.
    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_requested()
    }

    /// Resolves once this stage is asked to stop
    pub async fn aborted(&self) {
        self.abort.requested().await
    }

    /// Sends one item downstream unless aborted first
    ///
    /// Returns `false` when the stage should stop producing.
    pub async fn emit<T>(&self, output: &mpsc::Sender<T>, item: T) -> bool {
        self.abort.send(output, item).await
    }

    /// Receives the next input item
    ///
    /// Returns `None` when the input is exhausted or this stage was aborted.
    pub async fn recv<T>(&self, input: &mut mpsc::Receiver<T>) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.abort.requested() => None,
            item = input.recv() => item,
        }
    }

    /// Asks the previous stage to stop producing
    ///
    /// A no-op for the first stage.
    pub fn abort_upstream(&self) {
        if let Some(upstream) = &self.upstream {
            upstream.request();
        }
    }

    /// Aborts upstream and reports `error` to the caller
    pub(crate) fn abort_with_error(&self, error: anyhow::Error) {
        debug!("Stage {} failed: {:#}", self.name, error);
        self.abort_upstream();
        if self.events.send(StageEvent::Failed(error)).is_err() {
            debug!("Pipeline collector is gone, dropping error from {}", self.name);
        }
    }

    /// Marks the stage as done
    ///
    /// Consumes the context so completion is reported exactly once.
    pub(crate) fn finish(self) {
        self.abort_upstream();
        let stage = self.name;
        if self.events.send(StageEvent::Finished { stage }).is_err() {
            debug!("Pipeline collector is gone, completion not reported");
        }
    }
}
