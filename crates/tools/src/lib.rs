//! Tool registry and built-in tools.
//!
//! Tools are registered once at startup; the registry is read-only at
//! request time. The orchestrator looks tools up by name, validates the
//! model-produced arguments against the tool's schema, and executes.

pub mod builtin;
pub mod registry;
pub mod validate;

pub use registry::{Tool, ToolRegistry};
pub use validate::validate_arguments;
