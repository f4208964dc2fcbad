//! Redaction of secrets, tokens, and payment identifiers.
//!
//! Applied to every context fragment before it enters the bundle, and to
//! the final answer before it is returned or logged. Detection is
//! pattern-based over whitespace-separated words; the redacted field
//! labels travel with the guardrail decision into the audit record.

use wayfarer_core::context::ContextFragment;

const MASK: &str = "[REDACTED]";

/// Known secret prefixes for API keys and access tokens.
const SECRET_PREFIXES: &[&str] = &["sk-", "pk_", "ghp_", "gho_", "xoxb-", "xoxp-", "AKIA"];

/// Redact sensitive material from `text`. Returns the cleaned text and the
/// labels of what was removed (empty when nothing matched).
pub fn redact_text(text: &str) -> (String, Vec<String>) {
    let mut labels: Vec<String> = Vec::new();
    let mut out = String::with_capacity(text.len());

    let mut rest = text;
    while let Some(word_start) = rest.find(|c: char| !c.is_whitespace()) {
        out.push_str(&rest[..word_start]);
        rest = &rest[word_start..];
        let word_end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        let word = &rest[..word_end];

        if let Some(label) = classify_word(word) {
            out.push_str(MASK);
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        } else {
            out.push_str(word);
        }
        rest = &rest[word_end..];
    }
    out.push_str(rest);

    (out, labels)
}

/// Redact a fragment in place, returning the labels of what was removed.
pub fn redact_fragment(fragment: &mut ContextFragment) -> Vec<String> {
    let (clean, labels) = redact_text(&fragment.content);
    if !labels.is_empty() {
        fragment.content = clean;
    }
    labels
}

fn classify_word(word: &str) -> Option<&'static str> {
    let trimmed = word.trim_matches(|c: char| c.is_ascii_punctuation() && c != '-' && c != '_');
    if trimmed.is_empty() {
        return None;
    }

    if SECRET_PREFIXES.iter().any(|p| trimmed.starts_with(p)) && trimmed.len() >= 12 {
        return Some("secret");
    }

    if looks_like_card_number(trimmed) {
        return Some("payment_id");
    }

    if looks_like_iban(trimmed) {
        return Some("payment_id");
    }

    None
}

/// 13–19 digits, allowing `-` separators. Matches card PANs without
/// needing a Luhn pass; false positives on plain long numbers are an
/// acceptable trade for a context fragment.
fn looks_like_card_number(word: &str) -> bool {
    let digits: String = word.chars().filter(|c| c.is_ascii_digit()).collect();
    let non_digits_ok = word.chars().all(|c| c.is_ascii_digit() || c == '-');
    non_digits_ok && (13..=19).contains(&digits.len())
}

/// Two country letters, two check digits, then 11+ alphanumerics.
fn looks_like_iban(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    chars.len() >= 15
        && chars.len() <= 34
        && chars[..2].iter().all(|c| c.is_ascii_uppercase())
        && chars[2..4].iter().all(|c| c.is_ascii_digit())
        && chars[4..].iter().all(|c| c.is_ascii_alphanumeric())
}
