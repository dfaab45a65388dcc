//! `weft-domain` — shared types for the weft workflow orchestrator.
//!
//! Everything that crosses a crate boundary lives here: the closed error
//! set, workflow definitions, tool bindings and service descriptors,
//! execution records, and the process configuration.

pub mod binding;
pub mod config;
pub mod error;
pub mod execution;
pub mod workflow;

pub use error::{Error, ErrorKind, Result};
