//! Gateway-owned session store.
//!
//! The store maps session ids to individually locked [`Session`] values.
//! The outer map lock is held only for lookup and insertion; every
//! mutation happens under the per-session mutex, which linearizes
//! `append_message` and `append_trace_step` across concurrent callers.
//!
//! Two concurrent orchestration runs against the *same* session interleave
//! safely but in unspecified message order. Callers wanting strict
//! turn-taking must not issue concurrent calls for a single session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use maestro_domain::session::{Session, TraceStep};
use maestro_domain::trace::TraceEvent;
use maestro_domain::Message;

/// Ceiling on per-session trace length. Overflow drops the oldest steps.
pub const DEFAULT_TRACE_CAP: usize = 10_000;

/// Returned when an operation references a session id the store does not
/// hold.
#[derive(Debug, Clone)]
pub struct UnknownSession(pub String);

impl std::fmt::Display for UnknownSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown session '{}'", self.0)
    }
}

impl std::error::Error for UnknownSession {}

/// Compact per-session row for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListing {
    pub session_id: String,
    pub agent_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory session store with per-session locking.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    trace_cap: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_trace_cap(DEFAULT_TRACE_CAP)
    }

    pub fn with_trace_cap(trace_cap: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            trace_cap: trace_cap.max(2),
        }
    }

    /// Mint a new session with a unique id, empty history, empty trace.
    pub fn create(&self, agent_id: &str) -> Session {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), agent_id.to_owned());
        self.sessions
            .write()
            .insert(session_id, Arc::new(Mutex::new(session.clone())));
        tracing::debug!(session_id = %session.session_id, agent_id, "session created");
        session
    }

    /// Snapshot a session by id.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let handle = self.sessions.read().get(session_id).cloned()?;
        let session = handle.lock();
        Some(session.clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Run a closure against the locked session (cheap reads without a
    /// full snapshot clone).
    pub fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&Session) -> R,
    ) -> Result<R, UnknownSession> {
        let handle = self.handle(session_id)?;
        let session = handle.lock();
        Ok(f(&session))
    }

    /// Append a message. Atomic against concurrent callers on the same
    /// session; refreshes `updated_at` and the monotonic `message_count`.
    pub fn append_message(
        &self,
        session_id: &str,
        message: Message,
    ) -> Result<(), UnknownSession> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock();
        session.messages.push(message);
        session.message_count += 1;
        session.updated_at = Utc::now();
        debug_assert_eq!(
            session.message_count,
            session.messages.len() + session.summary_covered
        );
        Ok(())
    }

    /// Append a trace step, enforcing the trace ceiling. Overflow drops
    /// the oldest steps, never the newest; the first overflow records a
    /// one-shot `trace_truncated` marker.
    pub fn append_trace_step(
        &self,
        session_id: &str,
        step: TraceStep,
    ) -> Result<(), UnknownSession> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock();

        if session.trace.len() >= self.trace_cap {
            if !session.trace_truncated {
                session.trace_truncated = true;
                session.trace.pop_front();
                let marker = TraceStep {
                    timestamp: Utc::now(),
                    elapsed_ms: step.elapsed_ms,
                    component: "session_store".into(),
                    event: TraceEvent::TraceTruncated,
                    details: serde_json::json!({ "cap": self.trace_cap }),
                };
                session.trace.push_back(marker);
            }
            while session.trace.len() >= self.trace_cap {
                session.trace.pop_front();
            }
        }

        session.trace.push_back(step);
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Atomically collapse the oldest `prefix_len` messages into
    /// `summary`. The removed messages stay accounted for through
    /// `summary_covered`, so `message_count` is unchanged.
    pub fn replace_summary(
        &self,
        session_id: &str,
        summary: String,
        prefix_len: usize,
    ) -> Result<(), UnknownSession> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock();
        let prefix_len = prefix_len.min(session.messages.len());
        session.messages.drain(..prefix_len);
        session.summary_covered += prefix_len;
        session.summary = Some(summary);
        session.updated_at = Utc::now();
        debug_assert_eq!(
            session.message_count,
            session.messages.len() + session.summary_covered
        );
        Ok(())
    }

    /// Flag the session as completed. Returns `true` only on the first
    /// completion, so lifecycle metrics pair 1:1 with creation.
    pub fn mark_completed(&self, session_id: &str) -> Result<bool, UnknownSession> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock();
        let first = !session.completed;
        session.completed = true;
        Ok(first)
    }

    /// Count of messages currently in the history (excludes anything the
    /// summary stands in for). Drives the summarization trigger.
    pub fn active_message_count(&self, session_id: &str) -> Result<usize, UnknownSession> {
        self.with_session(session_id, |s| s.messages.len())
    }

    pub fn list(&self) -> Vec<SessionListing> {
        let sessions = self.sessions.read();
        let mut listings: Vec<SessionListing> = sessions
            .values()
            .map(|handle| {
                let s = handle.lock();
                SessionListing {
                    session_id: s.session_id.clone(),
                    agent_id: s.agent_id.clone(),
                    message_count: s.message_count,
                    created_at: s.created_at,
                    updated_at: s.updated_at,
                }
            })
            .collect();
        listings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        listings
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, UnknownSession> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| UnknownSession(session_id.to_owned()))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
