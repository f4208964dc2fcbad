//! Query and request/response types — one user turn through the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A prior turn in the concierge conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: TurnRole::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, text: text.into() }
    }
}

/// One user turn, as processed by the gateway.
///
/// Invariant: `user_id` must be an active member of `trip_id`, checked
/// before any context read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query_id: Uuid,
    pub user_id: String,
    pub trip_id: String,
    pub text: String,
    pub history: Vec<Turn>,
    pub timestamp: DateTime<Utc>,
}

impl Query {
    pub fn new(
        user_id: impl Into<String>,
        trip_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            user_id: user_id.into(),
            trip_id: trip_id.into(),
            text: text.into(),
            history: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Lowercased, whitespace-collapsed query text, used as a cache key
    /// component so trivial formatting differences still hit.
    pub fn normalized_text(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// The inbound request from a client. `user_id` comes from the session,
/// never from the request body of an untrusted caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConciergeRequest {
    pub trip_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    /// Present only when re-submitting a previously `require_confirmation`
    /// action; references the prior decision id from the audit record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

/// Description of a sensitive action awaiting explicit confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Decision id the caller must echo back in `confirm`.
    pub decision_id: String,
    pub category: crate::guardrail::ActionCategory,
    pub description: String,
}

/// The structured response returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConciergeResponse {
    pub answer: String,
    pub sources_used: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_descriptor: Option<ActionDescriptor>,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_text_collapses_whitespace_and_case() {
        let q = Query::new("u1", "t1", "  What   Time\tis the SHOW? ");
        assert_eq!(q.normalized_text(), "what time is the show?");
    }

    #[test]
    fn identical_meaning_normalizes_identically() {
        let a = Query::new("u1", "t1", "what time is the show");
        let b = Query::new("u2", "t1", "What  time is  the show");
        assert_eq!(a.normalized_text(), b.normalized_text());
    }

    #[test]
    fn response_omits_empty_confirmation_fields() {
        let resp = ConciergeResponse {
            answer: "hi".into(),
            sources_used: vec![],
            requires_confirmation: false,
            action_descriptor: None,
            degraded: false,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("requires_confirmation"));
        assert!(!json.contains("action_descriptor"));
    }
}
