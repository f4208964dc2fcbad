//! Degradation controller — answers without the model.
//!
//! A request degrades when the provider fails after retries or when the
//! context layer is below its safety floor. The degraded path never calls
//! the external provider: it synthesizes an answer directly from whatever
//! fragments are available, or says so plainly when nothing answers the
//! question. The state is per-request; the next request starts in normal
//! mode and recovers on its own successful provider call, so one bad
//! request never poisons the ones after it.

use wayfarer_core::context::ContextBundle;
use wayfarer_core::query::Query;

const NO_INFORMATION: &str =
    "I don't have enough information to answer that right now. Please try again in a moment.";

/// Synthesize a degraded answer from the bundle.
///
/// Fragments that share words with the query are quoted first; with no
/// overlap at all, the highest-priority fragments stand in. Assumptions
/// keep their labels.
pub fn synthesize(bundle: &ContextBundle, query: &Query) -> String {
    if bundle.is_empty() {
        return NO_INFORMATION.to_string();
    }

    let query_tokens: Vec<String> = query
        .normalized_text()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();

    let mut scored: Vec<(usize, usize)> = bundle
        .fragments
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let content = f.content.to_lowercase();
            let hits = query_tokens.iter().filter(|t| content.contains(*t)).count();
            (hits, i)
        })
        .collect();
    // Most overlapping first; bundle order (priority) breaks ties
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let any_overlap = scored.first().is_some_and(|(hits, _)| *hits > 0);
    let picked: Vec<&str> = scored
        .iter()
        .filter(|(hits, _)| !any_overlap || *hits > 0)
        .take(3)
        .map(|(_, i)| bundle.fragments[*i].content.as_str())
        .collect();

    if picked.is_empty() {
        return NO_INFORMATION.to_string();
    }

    let mut answer =
        String::from("I couldn't reach the assistant, but here is what your trip data says: ");
    for (n, content) in picked.iter().enumerate() {
        if n > 0 {
            answer.push_str("; ");
        }
        answer.push_str(content);
    }
    answer.push('.');
    answer
}
