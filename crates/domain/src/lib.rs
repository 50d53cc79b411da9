//! Shared value types and contracts for the maestro gateway.
//!
//! Everything here is a plain data contract: messages and tool calls,
//! agent/retry configuration, sessions and trace steps, the error
//! taxonomy, and the provider key handling. No I/O lives in this crate.

pub mod agent;
pub mod config;
pub mod error;
pub mod keys;
pub mod message;
pub mod orchestration;
pub mod provider;
pub mod session;
pub mod trace;

pub use agent::{AgentConfig, RetryConfig};
pub use error::{Error, ErrorKind, Result};
pub use message::{Message, Role, ToolCall, ToolSchema, Usage};
pub use orchestration::{OrchestrationRequest, OrchestrationResponse, ResponseMetadata};
pub use provider::ProviderTag;
pub use session::{Session, TraceStep};
pub use trace::TraceEvent;
