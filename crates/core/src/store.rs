//! Context store adapter traits — typed read-only accessors into each
//! external data domain.
//!
//! These are the leaf dependency of the whole gateway: everything composes
//! over them. Each adapter must itself enforce tenant scoping; the
//! aggregator re-checks returned records as defense in depth.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreError;
use crate::records::{
    Balance, CalendarEvent, ChatMessage, Place, Poll, Preference, Receipt, TaskItem,
};

type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Most recent messages, newest last.
    async fn recent_messages(&self, trip_id: &str, limit: usize) -> StoreResult<Vec<ChatMessage>>;
}

#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn upcoming_events(&self, trip_id: &str) -> StoreResult<Vec<CalendarEvent>>;
}

#[async_trait]
pub trait PaymentsStore: Send + Sync {
    async fn open_balances(&self, trip_id: &str) -> StoreResult<Vec<Balance>>;
}

#[async_trait]
pub trait PlacesStore: Send + Sync {
    async fn basecamp(&self, trip_id: &str) -> StoreResult<Option<Place>>;
    async fn saved_places(&self, trip_id: &str) -> StoreResult<Vec<Place>>;
}

#[async_trait]
pub trait TasksStore: Send + Sync {
    async fn open_tasks(&self, trip_id: &str) -> StoreResult<Vec<TaskItem>>;
}

#[async_trait]
pub trait PollsStore: Send + Sync {
    async fn open_polls(&self, trip_id: &str) -> StoreResult<Vec<Poll>>;
}

#[async_trait]
pub trait ReceiptsStore: Send + Sync {
    async fn recent_receipts(&self, trip_id: &str, limit: usize) -> StoreResult<Vec<Receipt>>;
}

#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn preferences(&self, trip_id: &str) -> StoreResult<Vec<Preference>>;
}

/// Membership check — called before any adapter read.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn is_active_member(&self, user_id: &str, trip_id: &str) -> StoreResult<bool>;
}

/// Identifier/version pair of one record, the unit of fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecordVersion {
    pub record_id: String,
    pub version: u64,
}

/// Cheap read of the current `(id, version)` pairs for a trip's records.
///
/// This is how cache lookups observe "did anything change" without
/// re-running the full context adapters: one indexed version scan backs
/// both the lookup-time fingerprint and the bundle fingerprint.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn data_versions(&self, trip_id: &str) -> StoreResult<Vec<RecordVersion>>;
}

/// The full set of context store adapters the aggregator reads from.
///
/// Cloning is cheap (all `Arc`s), so each request can take its own handle.
#[derive(Clone)]
pub struct ContextStores {
    pub chat: Arc<dyn ChatStore>,
    pub calendar: Arc<dyn CalendarStore>,
    pub payments: Arc<dyn PaymentsStore>,
    pub places: Arc<dyn PlacesStore>,
    pub tasks: Arc<dyn TasksStore>,
    pub polls: Arc<dyn PollsStore>,
    pub receipts: Arc<dyn ReceiptsStore>,
    pub preferences: Arc<dyn PreferencesStore>,
}

impl ContextStores {
    /// Number of adapters queried per aggregation pass. Used by the
    /// majority-timeout floor.
    pub const ADAPTER_COUNT: usize = 8;
}
