//! Concrete pipeline stages
//!
//! Sources feed registry or remote jobs into a pipeline, the middle stages
//! select, query, order and transform them, and the terminal stages record
//! or remove jobs. Renderers live in `crate::render`.

mod copier;
mod job_filter;
mod query;
mod recorder;
mod remover;
mod result_filter;
mod sort;
mod sources;
mod starter;

pub use copier::JobCopier;
pub use job_filter::JobFilter;
pub use query::{DEFAULT_QUERY_WIDTH, StatusQuery};
pub use recorder::StartRecorder;
pub use remover::JobRemover;
pub use result_filter::{ResultFilter, ResultWindow};
pub use sort::StatusSorter;
pub use sources::{JobSource, RemoteJobSource};
pub use starter::JobStarter;

use std::sync::{Arc, Mutex};

use ciq_core::Registry;

/// Registry shared by the stages of one command
pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Output sink of terminal stages, stdout outside of tests
pub type Output = Box<dyn std::io::Write + Send>;

/// Locks the shared registry, recovering from a poisoned lock
pub fn lock(registry: &SharedRegistry) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
