use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::trace::TraceEvent;

/// Server-side conversation state for one session.
///
/// Messages are append-only within a process lifetime; the summarizer may
/// collapse an old prefix into `summary`, in which case the collapsed
/// messages are removed on the same write and accounted for by
/// `summary_covered`. At every instant
/// `message_count == messages.len() + summary_covered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    /// Collapsed prefix of the conversation, if summarization has fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// How many messages the summary stands in for.
    #[serde(default)]
    pub summary_covered: usize,
    /// Monotonically growing count of all messages ever appended.
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub trace: VecDeque<TraceStep>,
    /// Set once the trace ring has dropped its first step.
    #[serde(default)]
    pub trace_truncated: bool,
    /// Set on the first request finalization against this session.
    #[serde(default)]
    pub completed: bool,
}

impl Session {
    pub fn new(session_id: String, agent_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            agent_id,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            summary: None,
            summary_covered: 0,
            message_count: 0,
            trace: VecDeque::new(),
            trace_truncated: false,
            completed: false,
        }
    }
}

/// One structured event recorded while processing a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    /// Wallclock time of the event.
    pub timestamp: DateTime<Utc>,
    /// Milliseconds since the owning request started (monotonic clock).
    pub elapsed_ms: u64,
    /// Emitting component, free-form (e.g. "orchestrator", "resilient_caller").
    pub component: String,
    pub event: TraceEvent,
    /// JSON-serializable detail map.
    pub details: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_upholds_count_invariant() {
        let s = Session::new("s1".into(), "agent".into());
        assert_eq!(s.message_count, s.messages.len() + s.summary_covered);
        assert!(s.created_at <= s.updated_at);
    }

    #[test]
    fn session_serializes_timestamps_as_iso8601() {
        let s = Session::new("s1".into(), "agent".into());
        let json = serde_json::to_value(&s).unwrap();
        let ts = json["created_at"].as_str().unwrap();
        assert!(ts.contains('T'), "expected ISO-8601, got {ts}");
        assert!(json.get("summary").is_none());
    }
}
