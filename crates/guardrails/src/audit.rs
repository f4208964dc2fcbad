//! Audit log — append-only storage of [`AuditRecord`]s with pluggable
//! sinks.
//!
//! The gateway writes one record per query as its final pipeline stage.
//! Records are kept in memory and forwarded to every configured sink;
//! external log storage plugs in by implementing [`AuditSink`].

use std::sync::Mutex;
use wayfarer_core::audit::{AuditRecord, AuditSink};

pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("record_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sinks,
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Find a past record containing the given guardrail decision id. Used
    /// to verify confirmation resubmissions.
    pub fn find_decision(&self, decision_id: &str) -> Option<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|r| r.decisions.iter().any(|d| d.decision_id == decision_id))
            .cloned()
    }
}

impl AuditSink for AuditLog {
    fn write(&self, record: &AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        for sink in &self.sinks {
            sink.write(record);
        }
    }
}

/// Sink that emits each record as a structured tracing event.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn write(&self, record: &AuditRecord) {
        tracing::info!(
            query_id = %record.query_id,
            trip_id = %record.trip_id,
            user_id = %record.user_id,
            decisions = record.decisions.len(),
            cache = ?record.cache,
            provider = ?record.provider,
            degraded = record.degraded,
            elapsed_ms = record.elapsed_ms,
            "AUDIT"
        );
    }
}
