//! Audit record types — the append-only trail of every query.
//!
//! One [`AuditRecord`] per query, created by the gateway handler at the end
//! of processing and never updated or deleted by the gateway itself.
//! Retention is an external data-governance concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::guardrail::GuardrailDecision;

/// How the cache behaved for this query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    Miss,
    /// Entry existed but its fingerprint no longer matched current data.
    Stale,
    /// The cache store errored; treated as a miss.
    Error,
    /// Lookup was never reached (request rejected earlier).
    Skipped,
}

/// How the provider call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success,
    /// Provider failed; answer was synthesized from context.
    Fallback,
    Error,
    /// Provider was never called (cache hit, block, or rejection).
    Skipped,
}

/// Append-only record of one query's passage through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub query_id: String,
    pub trip_id: String,
    pub user_id: String,
    /// All guardrail decisions made for this query, in order.
    pub decisions: Vec<GuardrailDecision>,
    pub cache: CacheOutcome,
    pub provider: ProviderOutcome,
    pub degraded: bool,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Where audit records are written. External log storage implements this.
pub trait AuditSink: Send + Sync {
    fn write(&self, record: &AuditRecord);
}
