//! `weft-tools` — the tool registry and discovery adapter.
//!
//! Bindings are registered at startup (built-in catalog) or at runtime via
//! service descriptors; once registered they are immutable and can only be
//! superseded by a strictly newer version. Lookup during execution sees a
//! consistent snapshot behind a read-write lock.

pub mod catalog;
pub mod discovery;
pub mod registry;
pub mod validate;

pub use discovery::{DiscoveryAdapter, DiscoveryReport, DiscoveryWarning};
pub use registry::ToolRegistry;
pub use validate::validate_arguments;
