//! `weft-client` — outbound HTTP for the weft orchestrator.
//!
//! This crate provides:
//! - [`ServiceClient`]: a thin wrapper over a pooled `reqwest::Client` with
//!   a mandatory timeout and engine-native error classification.
//! - [`ToolInvoker`]: the trait seam the executor dispatches tool calls
//!   through, with the client's generic binding interpreter as the
//!   production implementation. Tests substitute scripted stubs.
//!
//! The client never retries; retry policy belongs to the executor.

pub mod http;
pub mod invoker;

pub use http::{DecodedBody, HttpResponse, ServiceClient};
pub use invoker::{ToolInvoker, ToolResponse};
