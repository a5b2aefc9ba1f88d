//! Core domain types
//!
//! This module contains the domain structures used across ciq crates.
//! Jobs and runners are persisted in the registry, status records come back
//! from CI servers (and from the local result cache).

pub mod job;
pub mod runner;
pub mod status;
