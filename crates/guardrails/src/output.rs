//! Output risk gating — the third guardrail invocation point.
//!
//! Classifies the action a response would carry out. Sensitive categories
//! (export, delete, payment, booking, invite) always come back as
//! `require_confirmation`; the gateway never executes them directly. When
//! classification confidence is below threshold the verdict is still
//! `require_confirmation`, never `allow`.

use tracing::info;
use wayfarer_config::GuardrailConfig;
use wayfarer_core::guardrail::{ActionCategory, GuardrailDecision, ReasonCode, Verdict};

use crate::redact;

/// What the classifier saw in one query/answer pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionClassification {
    pub category: Option<ActionCategory>,
    pub confidence: f32,
}

/// Phrases that clearly signal a category, and weaker ones that only hint
/// at it.
const SIGNALS: &[(ActionCategory, &[&str], &[&str])] = &[
    (
        ActionCategory::ExportData,
        &["export", "download all", "send me all", "dump the"],
        &["all member emails", "everyone's contact"],
    ),
    (
        ActionCategory::DeleteData,
        &["delete", "erase all", "wipe the"],
        &["remove all", "clear out"],
    ),
    (
        ActionCategory::InitiatePayment,
        &["pay ", "settle up", "send money", "transfer money", "initiate a payment"],
        &["venmo", "square up"],
    ),
    (
        ActionCategory::CreateBooking,
        &["book ", "reserve a", "make a reservation", "make a booking"],
        &["get us a table"],
    ),
    (
        ActionCategory::SendInvite,
        &["invite ", "send an invite", "add them to the trip"],
        &["share the trip with"],
    ),
];

/// Keyword classifier over the query and the proposed answer. Deterministic
/// and cheap; the confidence threshold decides how its output is gated.
pub fn classify(query_text: &str, answer: &str) -> ActionClassification {
    let query = query_text.to_lowercase();
    let answer = answer.to_lowercase();

    let mut best: Option<(ActionCategory, f32)> = None;
    for (category, strong, weak) in SIGNALS {
        let mut confidence: f32 = 0.0;
        if strong.iter().any(|s| query.contains(s)) {
            confidence = 0.9;
        } else if strong.iter().any(|s| answer.contains(s)) {
            confidence = 0.7;
        } else if weak.iter().any(|s| query.contains(s) || answer.contains(s)) {
            confidence = 0.4;
        }
        if confidence > 0.0 && best.map_or(true, |(_, c)| confidence > c) {
            best = Some((*category, confidence));
        }
    }

    match best {
        Some((category, confidence)) => ActionClassification {
            category: Some(category),
            confidence,
        },
        None => ActionClassification { category: None, confidence: 1.0 },
    }
}

/// Gate one proposed answer. Returns the decision, the detected category
/// (when confirmation is required), and the answer with any leaked
/// sensitive material redacted.
pub fn gate(
    query_text: &str,
    answer: &str,
    config: &GuardrailConfig,
) -> (GuardrailDecision, Option<ActionCategory>, String) {
    let (clean_answer, redacted) = redact::redact_text(answer);

    let classification = classify(query_text, &clean_answer);
    let decision = match classification.category {
        Some(category) => {
            let reason = if classification.confidence >= config.confidence_threshold {
                ReasonCode::SensitiveAction
            } else {
                // Ambiguous risk defaults to confirmation, never allow
                ReasonCode::LowConfidence
            };
            let decision = GuardrailDecision::new(
                Verdict::RequireConfirmation,
                reason,
                classification.confidence,
            )
            .with_redactions(redacted)
            .with_category(category);
            info!(
                decision_id = %decision.decision_id,
                category = ?category,
                confidence = classification.confidence,
                "Output gated pending confirmation"
            );
            return (decision, Some(category), clean_answer);
        }
        None => GuardrailDecision::allow().with_redactions(redacted),
    };

    (decision, None, clean_answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GuardrailConfig {
        GuardrailConfig::default()
    }

    #[test]
    fn informational_answer_allowed() {
        let (d, category, _) = gate(
            "what time does the show start",
            "The show starts at 20:00 at Alfama.",
            &config(),
        );
        assert!(d.is_allow());
        assert!(category.is_none());
    }

    #[test]
    fn export_request_requires_confirmation() {
        let (d, category, _) = gate(
            "export all member emails",
            "I can export the member list for you.",
            &config(),
        );
        assert_eq!(d.verdict, Verdict::RequireConfirmation);
        assert_eq!(d.reason, ReasonCode::SensitiveAction);
        assert_eq!(category, Some(ActionCategory::ExportData));
        // The decision itself records what it gates, so a confirmation
        // referencing it can be checked against the resubmitted action.
        assert_eq!(d.category, Some(ActionCategory::ExportData));
    }

    #[test]
    fn payment_requires_confirmation() {
        let (d, category, _) = gate(
            "settle up with chris",
            "I'll initiate a payment of EUR 82.50 to chris.",
            &config(),
        );
        assert_eq!(d.verdict, Verdict::RequireConfirmation);
        assert_eq!(category, Some(ActionCategory::InitiatePayment));
    }

    #[test]
    fn ambiguous_risk_defaults_to_confirmation() {
        // Weak signal only: confidence 0.4 < threshold 0.5
        let (d, category, _) = gate(
            "can you get us a table somewhere",
            "Sure, I could look into that.",
            &config(),
        );
        assert_eq!(d.verdict, Verdict::RequireConfirmation);
        assert_eq!(d.reason, ReasonCode::LowConfidence);
        assert_eq!(category, Some(ActionCategory::CreateBooking));
    }

    #[test]
    fn leaked_secret_redacted_from_answer() {
        let (d, _, clean) = gate(
            "what's the api key",
            "The key is sk-verysecret12345678 as saved.",
            &config(),
        );
        assert!(d.is_allow());
        assert!(!clean.contains("sk-verysecret"));
        assert_eq!(d.redacted_fields, vec!["secret".to_string()]);
    }

    #[test]
    fn classifier_prefers_strongest_signal() {
        let c = classify("book a table and pay the deposit", "");
        assert!(c.category.is_some());
        assert!(c.confidence >= 0.9);
    }
}
