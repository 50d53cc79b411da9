//! Orchestration runtime: the reasoning loop, the resilient model-call
//! layer, history summarization, and the per-session tracer.

pub mod orchestrator;
pub mod retry;
pub mod summarize;
pub mod tracer;

pub use orchestrator::run_orchestration;
pub use retry::resilient_chat_completion;
pub use tracer::Tracer;
