//! ciq Pipeline
//!
//! A small engine for linear chains of concurrently running stages.
//!
//! Every stage runs as its own tokio task and talks to its neighbours only
//! through bounded channels it owns. Two signals travel in opposite
//! directions:
//!
//! - end of data travels downstream: a finished stage drops its output
//!   sender, and the next stage sees its input close;
//! - stop producing travels upstream: a stage that fails (or simply
//!   finishes) raises the abort flag of the stage before it. Aborts are
//!   coalesced, raising an already raised flag does nothing.
//!
//! Errors and completions from all stages go through one queue read by the
//! caller through [`PipelineErrors`]. A stage always reports its error before
//! its completion, so no error can be missed once every stage has finished.
//!
//! # Example
//!
//! ```no_run
//! use ciq_pipeline::{Pipeline, Stage, StageContext};
//! use tokio::sync::mpsc;
//!
//! struct Numbers {
//!     output: mpsc::Sender<u32>,
//! }
//!
//! #[async_trait::async_trait]
//! impl Stage for Numbers {
//!     async fn run(&mut self, ctx: &StageContext) -> anyhow::Result<()> {
//!         for n in 0..3 {
//!             if !ctx.emit(&self.output, n).await {
//!                 break;
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! struct Print {
//!     input: mpsc::Receiver<u32>,
//! }
//!
//! #[async_trait::async_trait]
//! impl Stage for Print {
//!     async fn run(&mut self, ctx: &StageContext) -> anyhow::Result<()> {
//!         while let Some(n) = ctx.recv(&mut self.input).await {
//!             println!("{n}");
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() {
//! let (tx, rx) = mpsc::channel(10);
//! let mut errors = Pipeline::builder()
//!     .stage(Numbers { output: tx })
//!     .stage(Print { input: rx })
//!     .start();
//! while let Some(err) = errors.recv().await {
//!     eprintln!("error: {err:#}");
//! }
//! # }
//! ```

mod abort;
mod orchestrator;
mod stage;

pub use abort::AbortSignal;
pub use orchestrator::{Pipeline, PipelineBuilder, PipelineErrors};
pub use stage::{Stage, StageContext};

/// Capacity used for channels between stages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;
