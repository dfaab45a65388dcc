//! `weft-engine` — the workflow execution core.
//!
//! This crate owns everything between "a definition arrived" and "a final
//! snapshot exists":
//! - [`compiler`]: validates and indexes a [`weft_domain::workflow::WorkflowDefinition`].
//! - [`state`]: the per-execution mutable record threaded through nodes.
//! - [`executor`]: the serial node-dispatch loop with retry, cancellation,
//!   and deadline observation.
//! - [`registry`]: the process-wide table of live and recent executions.
//! - [`templates`]: the built-in, pre-validated workflow library.
//! - [`persist`]: the optional terminal-snapshot sink.

pub mod cancel;
pub mod compiler;
pub mod conditions;
pub mod executor;
pub mod persist;
pub mod registry;
pub mod state;
pub mod templates;

pub use cancel::CancelToken;
pub use compiler::{compile, CompiledWorkflow, Transition};
pub use conditions::ConditionRegistry;
pub use executor::Executor;
pub use registry::{ExecutionRegistry, SubmitOptions};
pub use state::ExecutionState;
pub use templates::TemplateLibrary;
