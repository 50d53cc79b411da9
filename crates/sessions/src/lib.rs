//! In-memory session state for the maestro gateway.
//!
//! Sessions live for the process lifetime. Each session has its own
//! mutual-exclusion region; the store as a whole supports concurrent
//! access to different sessions without contention.

pub mod store;

pub use store::{SessionListing, SessionStore, UnknownSession, DEFAULT_TRACE_CAP};
