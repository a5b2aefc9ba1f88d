//! ciq Core
//!
//! Core types and abstractions shared by the ciq crates.
//!
//! This crate contains:
//! - Domain types: jobs, runners and the build status records queried from CI servers
//! - Registry: the on-disk job registry with atomic persistence

pub mod domain;
pub mod registry;

pub use registry::{Registry, RegistryError};
