//! `weft-gateway` — the orchestrator's public HTTP surface.
//!
//! Thin layer over `weft-engine`: request validation, error-kind → status
//! mapping, and the fixed route table. All engine behavior lives below the
//! API boundary.

pub mod api;
pub mod cli;
pub mod state;
