//! Tool allowlist and schema validation — the second guardrail invocation
//! point.
//!
//! Every tool call is checked against a fixed registry: the tool name must
//! be listed, parameters must match an exact schema (unknown keys reject
//! the whole call), and no parameter may carry a `user_id`/`trip_id` that
//! differs from the authenticated session's. The gateway injects those two
//! itself; they are never accepted from query text or history.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

use wayfarer_core::guardrail::{GuardrailDecision, ReasonCode, Verdict};

/// Accepted JSON types for a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

/// One parameter in a tool schema.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
}

/// The exact schema of one allowlisted tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub params: Vec<ParamSpec>,
}

/// A proposed tool call, as parsed from a model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub params: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Map::new() }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

fn param(name: &'static str, param_type: ParamType, required: bool) -> ParamSpec {
    ParamSpec { name, param_type, required }
}

/// The fixed tool allowlist. There is no way to register a tool at
/// runtime; the registry is part of the deployed policy.
pub struct ToolRegistry {
    specs: HashMap<&'static str, ToolSpec>,
}

impl ToolRegistry {
    /// The standard concierge read tools.
    pub fn standard() -> Self {
        let specs = [
            ToolSpec {
                name: "list_upcoming_events",
                params: vec![
                    param("trip_id", ParamType::String, true),
                    param("limit", ParamType::Integer, false),
                ],
            },
            ToolSpec {
                name: "get_saved_places",
                params: vec![param("trip_id", ParamType::String, true)],
            },
            ToolSpec {
                name: "get_open_balances",
                params: vec![
                    param("trip_id", ParamType::String, true),
                    param("user_id", ParamType::String, false),
                ],
            },
            ToolSpec {
                name: "fetch_link_preview",
                params: vec![param("url", ParamType::String, true)],
            },
        ];
        Self {
            specs: specs.into_iter().map(|s| (s.name, s)).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Overwrite identity parameters with the authenticated session's
    /// values. Called by the gateway after validation, so a tool can only
    /// ever execute against the session's own tenant.
    pub fn pin_session(call: &mut ToolCall, session_user: &str, session_trip: &str) {
        if call.params.contains_key("trip_id") {
            call.params
                .insert("trip_id".into(), Value::String(session_trip.into()));
        }
        if call.params.contains_key("user_id") {
            call.params
                .insert("user_id".into(), Value::String(session_user.into()));
        }
    }

    /// Validate one proposed call against the allowlist, its schema, and
    /// the session identity.
    pub fn validate_call(
        &self,
        call: &ToolCall,
        session_user: &str,
        session_trip: &str,
    ) -> GuardrailDecision {
        let Some(spec) = self.specs.get(call.name.as_str()) else {
            return blocked(call, ReasonCode::UnknownTool, 0.6);
        };

        // Unknown keys reject the whole call
        for key in call.params.keys() {
            if !spec.params.iter().any(|p| p.name == key) {
                return blocked(call, ReasonCode::SchemaViolation, 0.5);
            }
        }

        for p in &spec.params {
            match call.params.get(p.name) {
                Some(value) => {
                    if !p.param_type.matches(value) {
                        return blocked(call, ReasonCode::SchemaViolation, 0.5);
                    }
                }
                None if p.required => {
                    return blocked(call, ReasonCode::SchemaViolation, 0.5);
                }
                None => {}
            }
        }

        // Identity pinning: a caller-supplied id that differs from the
        // session is a cross-tenant request smuggled as a tool argument.
        if let Some(Value::String(trip)) = call.params.get("trip_id") {
            if trip != session_trip {
                return blocked(call, ReasonCode::TenantMismatch, 0.9);
            }
        }
        if let Some(Value::String(user)) = call.params.get("user_id") {
            if user != session_user {
                return blocked(call, ReasonCode::IdentityMismatch, 0.9);
            }
        }

        GuardrailDecision::allow()
    }
}

fn blocked(call: &ToolCall, reason: ReasonCode, risk: f32) -> GuardrailDecision {
    let decision = GuardrailDecision::new(Verdict::Block, reason, risk);
    warn!(
        tool = %call.name,
        decision_id = %decision.decision_id,
        reason = ?reason,
        "Tool call blocked"
    );
    decision
}
