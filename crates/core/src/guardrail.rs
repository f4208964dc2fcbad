//! Guardrail decision types.
//!
//! A [`GuardrailDecision`] is the outcome of validating one request, one
//! tool call, or one proposed model action. Decisions are created at each
//! validation point, persisted to the audit record, and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The verdict of one validation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Block,
    /// The gateway never executes the action; the caller must re-submit
    /// with an explicit confirmation referencing this decision.
    RequireConfirmation,
}

/// Machine-readable reason codes, written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Ok,
    TextTooLong,
    MalformedRequest,
    DisallowedScheme,
    InjectionSuspected,
    UnknownTool,
    SchemaViolation,
    IdentityMismatch,
    TenantMismatch,
    SensitiveAction,
    LowConfidence,
    SsrfDenied,
}

/// Sensitive action categories that always require confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    ExportData,
    DeleteData,
    InitiatePayment,
    CreateBooking,
    SendInvite,
}

impl ActionCategory {
    /// Short description used in action descriptors returned to the caller.
    pub fn describe(&self) -> &'static str {
        match self {
            ActionCategory::ExportData => "export trip data",
            ActionCategory::DeleteData => "delete trip data",
            ActionCategory::InitiatePayment => "initiate a payment",
            ActionCategory::CreateBooking => "create a booking",
            ActionCategory::SendInvite => "send an invite",
        }
    }
}

/// Outcome of validating one request or one tool call. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailDecision {
    pub decision_id: String,
    pub verdict: Verdict,
    pub reason: ReasonCode,
    /// 0.0 (benign) to 1.0 (certain violation).
    pub risk_score: f32,
    /// Field names stripped from logs and context before this point.
    pub redacted_fields: Vec<String>,
    /// The sensitive action this decision gates. Set only with
    /// [`Verdict::RequireConfirmation`]; a confirmation is valid only for
    /// the same category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ActionCategory>,
    pub timestamp: DateTime<Utc>,
}

impl GuardrailDecision {
    pub fn new(verdict: Verdict, reason: ReasonCode, risk_score: f32) -> Self {
        Self {
            decision_id: Uuid::new_v4().to_string(),
            verdict,
            reason,
            risk_score,
            redacted_fields: Vec::new(),
            category: None,
            timestamp: Utc::now(),
        }
    }

    pub fn allow() -> Self {
        Self::new(Verdict::Allow, ReasonCode::Ok, 0.0)
    }

    pub fn with_redactions(mut self, fields: Vec<String>) -> Self {
        self.redacted_fields = fields;
        self
    }

    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn is_allow(&self) -> bool {
        self.verdict == Verdict::Allow
    }
}
