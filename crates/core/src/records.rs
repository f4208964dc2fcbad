//! Record types returned by the external data-domain stores.
//!
//! Every record carries its owning `trip_id`, a stable `id`, and a
//! monotonically increasing `version`. The version feeds the context
//! fingerprint: any edit to a contributing record changes the fingerprint
//! and invalidates cached answers without explicit invalidation messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message in a trip's group conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub trip_id: String,
    pub sender_id: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub version: u64,
}

/// A calendar event on the trip itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub version: u64,
}

/// An open balance between trip members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub id: String,
    pub trip_id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// A saved place, or the trip's basecamp (lodging).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub trip_id: String,
    pub name: String,
    pub address: Option<String>,
    /// Link attached to the place, if any (booking page, map pin).
    pub url: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub version: u64,
}

/// A task on the trip's shared checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub assignee_id: Option<String>,
    pub done: bool,
    pub due: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// A group poll with its current tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub trip_id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub closed: bool,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    pub votes: u32,
}

impl Poll {
    /// The currently leading option, if any votes were cast.
    pub fn leading_option(&self) -> Option<&PollOption> {
        self.options
            .iter()
            .filter(|o| o.votes > 0)
            .max_by_key(|o| o.votes)
    }
}

/// A scanned or uploaded receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub trip_id: String,
    pub merchant: String,
    pub total_cents: i64,
    pub currency: String,
    pub paid_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub version: u64,
}

/// A per-user preference visible to the concierge (dietary, mobility, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub id: String,
    pub trip_id: String,
    pub user_id: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}
