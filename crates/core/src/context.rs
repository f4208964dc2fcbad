//! Context bundle types — the trust-tagged payload handed to the model.
//!
//! A [`ContextFragment`] is one discrete piece of retrieved context with a
//! source and a trust tag. The trust tag is first-class and survives all the
//! way into prompt assembly: retrieved trip content and externally fetched
//! content are *data*, never instructions, and are never collapsed into one
//! undifferentiated string with the policy preamble.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trust levels, highest first. Ordering matters: `Policy > TripData > External`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Externally fetched content (link previews). Data only.
    External,
    /// Content retrieved from the trip's own stores. Data only.
    TripData,
    /// System policy text. The only instruction-bearing level.
    Policy,
}

/// Which data domain a fragment came from.
///
/// The enum order encodes the resolution priority when multiple sources
/// could answer the same sub-question: calendar beats basecamp beats saved
/// links beats chat beats anything inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Calendar,
    Basecamp,
    SavedPlaces,
    SavedLinks,
    Chat,
    Payments,
    Receipts,
    Tasks,
    Polls,
    Preferences,
    /// An externally fetched link preview.
    LinkPreview,
    /// A value the gateway inferred rather than read. Always labeled.
    Inferred,
}

impl ContextSource {
    /// Source priority for ranking and truncation. Lower is better.
    pub fn priority(&self) -> u8 {
        match self {
            ContextSource::Calendar => 0,
            ContextSource::Basecamp => 1,
            ContextSource::SavedPlaces => 1,
            ContextSource::SavedLinks => 2,
            ContextSource::Chat => 3,
            ContextSource::Payments => 3,
            ContextSource::Receipts => 3,
            ContextSource::Tasks => 3,
            ContextSource::Polls => 3,
            ContextSource::Preferences => 3,
            ContextSource::LinkPreview => 4,
            ContextSource::Inferred => 5,
        }
    }

    /// Human-readable label used in prompts and `sources_used`.
    pub fn label(&self) -> &'static str {
        match self {
            ContextSource::Calendar => "calendar",
            ContextSource::Basecamp => "basecamp",
            ContextSource::SavedPlaces => "saved_places",
            ContextSource::SavedLinks => "saved_links",
            ContextSource::Chat => "chat",
            ContextSource::Payments => "payments",
            ContextSource::Receipts => "receipts",
            ContextSource::Tasks => "tasks",
            ContextSource::Polls => "polls",
            ContextSource::Preferences => "preferences",
            ContextSource::LinkPreview => "link_preview",
            ContextSource::Inferred => "inferred",
        }
    }
}

/// One discrete piece of retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFragment {
    /// Which domain produced this fragment.
    pub source: ContextSource,
    /// Rendered text content (already redacted by the guardrail pipeline).
    pub content: String,
    /// Identifier of the contributing record.
    pub record_id: String,
    /// Version of the contributing record, for fingerprinting.
    pub record_version: u64,
    /// Timestamp used for recency scoring.
    pub recency: DateTime<Utc>,
    /// Trust tag, carried through to prompt assembly.
    pub trust: TrustLevel,
    /// True when the content is an assumption, not a retrieved fact.
    /// Assumed fragments must be presented as assumptions, never as fact.
    pub assumed: bool,
}

impl ContextFragment {
    /// Character cost of this fragment inside a serialized bundle.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// The aggregated, trust-tagged payload handed to the model.
///
/// Fragments are ordered by descending priority. The character budget is a
/// hard ceiling, enforced by the aggregator *before* any provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub trip_id: String,
    pub fragments: Vec<ContextFragment>,
    pub char_budget: usize,
    /// Hash of the (record_id, version) pairs that contributed.
    pub fingerprint: String,
}

impl ContextBundle {
    /// An empty bundle for a trip (used by the degraded path when
    /// aggregation itself failed).
    pub fn empty(trip_id: impl Into<String>, char_budget: usize) -> Self {
        Self {
            trip_id: trip_id.into(),
            fragments: Vec::new(),
            char_budget,
            fingerprint: String::new(),
        }
    }

    /// Total character count across all fragments.
    pub fn total_chars(&self) -> usize {
        self.fragments.iter().map(|f| f.char_len()).sum()
    }

    /// Distinct source labels, in bundle order.
    pub fn sources_used(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for frag in &self.fragments {
            let label = frag.source.label().to_string();
            if !seen.contains(&label) {
                seen.push(label);
            }
        }
        seen
    }

    /// Fragments from a single source, in bundle order.
    pub fn fragments_from(&self, source: ContextSource) -> impl Iterator<Item = &ContextFragment> {
        self.fragments.iter().filter(move |f| f.source == source)
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
