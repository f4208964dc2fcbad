//! One in-memory backend implementing every context store trait.
//!
//! All reads filter by `trip_id` before returning — tenant scoping is the
//! adapter's own responsibility, independent of the aggregator's
//! defense-in-depth re-check.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use wayfarer_core::error::StoreError;
use wayfarer_core::records::{
    Balance, CalendarEvent, ChatMessage, Place, Poll, Preference, Receipt, TaskItem,
};
use wayfarer_core::store::{
    CalendarStore, ChatStore, ContextStores, MembershipStore, PaymentsStore, PlacesStore,
    PollsStore, PreferencesStore, ReceiptsStore, RecordVersion, TasksStore, VersionStore,
};

#[derive(Default)]
struct TripData {
    members: HashSet<(String, String)>, // (user_id, trip_id)
    messages: Vec<ChatMessage>,
    events: Vec<CalendarEvent>,
    balances: Vec<Balance>,
    basecamps: Vec<Place>,
    places: Vec<Place>,
    tasks: Vec<TaskItem>,
    polls: Vec<Poll>,
    receipts: Vec<Receipt>,
    preferences: Vec<Preference>,
}

/// In-memory backend for every data domain the concierge reads.
#[derive(Default)]
pub struct InMemoryTripStore {
    data: RwLock<TripData>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle this store into a [`ContextStores`] handle for the aggregator.
    pub fn stores(self: &Arc<Self>) -> ContextStores {
        ContextStores {
            chat: self.clone(),
            calendar: self.clone(),
            payments: self.clone(),
            places: self.clone(),
            tasks: self.clone(),
            polls: self.clone(),
            receipts: self.clone(),
            preferences: self.clone(),
        }
    }

    // --- Write-side helpers (the external platform's concern; exposed here
    //     so tests and the demo can set up and mutate trip state) ---

    pub async fn add_member(&self, user_id: &str, trip_id: &str) {
        self.data
            .write()
            .await
            .members
            .insert((user_id.to_string(), trip_id.to_string()));
    }

    pub async fn remove_member(&self, user_id: &str, trip_id: &str) {
        self.data
            .write()
            .await
            .members
            .remove(&(user_id.to_string(), trip_id.to_string()));
    }

    pub async fn add_message(&self, message: ChatMessage) {
        self.data.write().await.messages.push(message);
    }

    pub async fn add_event(&self, event: CalendarEvent) {
        self.data.write().await.events.push(event);
    }

    /// Bump an event's version in place, simulating an edit on the platform.
    pub async fn touch_event(&self, event_id: &str) {
        let mut data = self.data.write().await;
        if let Some(event) = data.events.iter_mut().find(|e| e.id == event_id) {
            event.version += 1;
        }
    }

    pub async fn add_balance(&self, balance: Balance) {
        self.data.write().await.balances.push(balance);
    }

    pub async fn set_basecamp(&self, place: Place) {
        let mut data = self.data.write().await;
        data.basecamps.retain(|p| p.trip_id != place.trip_id);
        data.basecamps.push(place);
    }

    pub async fn add_place(&self, place: Place) {
        self.data.write().await.places.push(place);
    }

    pub async fn add_task(&self, task: TaskItem) {
        self.data.write().await.tasks.push(task);
    }

    pub async fn add_poll(&self, poll: Poll) {
        self.data.write().await.polls.push(poll);
    }

    pub async fn add_receipt(&self, receipt: Receipt) {
        self.data.write().await.receipts.push(receipt);
    }

    pub async fn add_preference(&self, preference: Preference) {
        self.data.write().await.preferences.push(preference);
    }
}

#[async_trait]
impl MembershipStore for InMemoryTripStore {
    async fn is_active_member(&self, user_id: &str, trip_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .members
            .contains(&(user_id.to_string(), trip_id.to_string())))
    }
}

#[async_trait]
impl VersionStore for InMemoryTripStore {
    async fn data_versions(&self, trip_id: &str) -> Result<Vec<RecordVersion>, StoreError> {
        let data = self.data.read().await;
        let mut versions: Vec<RecordVersion> = Vec::new();

        let pair = |id: &str, version: u64| RecordVersion { record_id: id.to_string(), version };
        versions.extend(
            data.messages
                .iter()
                .filter(|m| m.trip_id == trip_id)
                .map(|m| pair(&m.id, m.version)),
        );
        versions.extend(
            data.events
                .iter()
                .filter(|e| e.trip_id == trip_id)
                .map(|e| pair(&e.id, e.version)),
        );
        versions.extend(
            data.balances
                .iter()
                .filter(|b| b.trip_id == trip_id)
                .map(|b| pair(&b.id, b.version)),
        );
        versions.extend(
            data.basecamps
                .iter()
                .chain(data.places.iter())
                .filter(|p| p.trip_id == trip_id)
                .map(|p| pair(&p.id, p.version)),
        );
        versions.extend(
            data.tasks
                .iter()
                .filter(|t| t.trip_id == trip_id)
                .map(|t| pair(&t.id, t.version)),
        );
        versions.extend(
            data.polls
                .iter()
                .filter(|p| p.trip_id == trip_id)
                .map(|p| pair(&p.id, p.version)),
        );
        versions.extend(
            data.receipts
                .iter()
                .filter(|r| r.trip_id == trip_id)
                .map(|r| pair(&r.id, r.version)),
        );
        versions.extend(
            data.preferences
                .iter()
                .filter(|p| p.trip_id == trip_id)
                .map(|p| pair(&p.id, p.version)),
        );
        Ok(versions)
    }
}

#[async_trait]
impl ChatStore for InMemoryTripStore {
    async fn recent_messages(
        &self,
        trip_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let data = self.data.read().await;
        let mut messages: Vec<ChatMessage> = data
            .messages
            .iter()
            .filter(|m| m.trip_id == trip_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.sent_at);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }
}

#[async_trait]
impl CalendarStore for InMemoryTripStore {
    async fn upcoming_events(&self, trip_id: &str) -> Result<Vec<CalendarEvent>, StoreError> {
        let data = self.data.read().await;
        let mut events: Vec<CalendarEvent> = data
            .events
            .iter()
            .filter(|e| e.trip_id == trip_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }
}

#[async_trait]
impl PaymentsStore for InMemoryTripStore {
    async fn open_balances(&self, trip_id: &str) -> Result<Vec<Balance>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .balances
            .iter()
            .filter(|b| b.trip_id == trip_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlacesStore for InMemoryTripStore {
    async fn basecamp(&self, trip_id: &str) -> Result<Option<Place>, StoreError> {
        let data = self.data.read().await;
        Ok(data.basecamps.iter().find(|p| p.trip_id == trip_id).cloned())
    }

    async fn saved_places(&self, trip_id: &str) -> Result<Vec<Place>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .places
            .iter()
            .filter(|p| p.trip_id == trip_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TasksStore for InMemoryTripStore {
    async fn open_tasks(&self, trip_id: &str) -> Result<Vec<TaskItem>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .tasks
            .iter()
            .filter(|t| t.trip_id == trip_id && !t.done)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PollsStore for InMemoryTripStore {
    async fn open_polls(&self, trip_id: &str) -> Result<Vec<Poll>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .polls
            .iter()
            .filter(|p| p.trip_id == trip_id && !p.closed)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReceiptsStore for InMemoryTripStore {
    async fn recent_receipts(
        &self,
        trip_id: &str,
        limit: usize,
    ) -> Result<Vec<Receipt>, StoreError> {
        let data = self.data.read().await;
        let mut receipts: Vec<Receipt> = data
            .receipts
            .iter()
            .filter(|r| r.trip_id == trip_id)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| std::cmp::Reverse(r.uploaded_at));
        receipts.truncate(limit);
        Ok(receipts)
    }
}

#[async_trait]
impl PreferencesStore for InMemoryTripStore {
    async fn preferences(&self, trip_id: &str) -> Result<Vec<Preference>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .preferences
            .iter()
            .filter(|p| p.trip_id == trip_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(id: &str, trip: &str, minutes_ago: i64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            trip_id: trip.into(),
            sender_id: "u1".into(),
            text: format!("message {id}"),
            sent_at: Utc::now() - Duration::minutes(minutes_ago),
            version: 1,
        }
    }

    #[tokio::test]
    async fn membership_add_and_remove() {
        let store = InMemoryTripStore::new();
        store.add_member("u1", "t1").await;
        assert!(store.is_active_member("u1", "t1").await.unwrap());
        assert!(!store.is_active_member("u1", "t2").await.unwrap());

        store.remove_member("u1", "t1").await;
        assert!(!store.is_active_member("u1", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn chat_is_tenant_scoped_and_limited() {
        let store = InMemoryTripStore::new();
        store.add_message(message("m1", "t1", 30)).await;
        store.add_message(message("m2", "t1", 20)).await;
        store.add_message(message("m3", "t1", 10)).await;
        store.add_message(message("other", "t2", 5)).await;

        let msgs = store.recent_messages("t1", 2).await.unwrap();
        assert_eq!(msgs.len(), 2);
        // newest last, and no cross-tenant leakage
        assert_eq!(msgs[0].id, "m2");
        assert_eq!(msgs[1].id, "m3");
        assert!(msgs.iter().all(|m| m.trip_id == "t1"));
    }

    #[tokio::test]
    async fn touch_event_bumps_version() {
        let store = InMemoryTripStore::new();
        store
            .add_event(CalendarEvent {
                id: "e1".into(),
                trip_id: "t1".into(),
                title: "Show".into(),
                start: Utc::now(),
                end: None,
                location: None,
                version: 1,
            })
            .await;

        store.touch_event("e1").await;
        let events = store.upcoming_events("t1").await.unwrap();
        assert_eq!(events[0].version, 2);
    }

    #[tokio::test]
    async fn open_tasks_excludes_done() {
        let store = InMemoryTripStore::new();
        store
            .add_task(TaskItem {
                id: "task1".into(),
                trip_id: "t1".into(),
                title: "Book museum tickets".into(),
                assignee_id: None,
                done: false,
                due: None,
                updated_at: Utc::now(),
                version: 1,
            })
            .await;
        store
            .add_task(TaskItem {
                id: "task2".into(),
                trip_id: "t1".into(),
                title: "Pack".into(),
                assignee_id: None,
                done: true,
                due: None,
                updated_at: Utc::now(),
                version: 1,
            })
            .await;

        let tasks = store.open_tasks("t1").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "task1");
    }

    #[tokio::test]
    async fn data_versions_observe_edits() {
        let store = InMemoryTripStore::new();
        store
            .add_event(CalendarEvent {
                id: "e1".into(),
                trip_id: "t1".into(),
                title: "Show".into(),
                start: Utc::now(),
                end: None,
                location: None,
                version: 1,
            })
            .await;
        store.add_message(message("m1", "t1", 5)).await;
        store.add_message(message("other", "t2", 5)).await;

        let before = store.data_versions("t1").await.unwrap();
        assert_eq!(before.len(), 2);
        assert!(before.iter().all(|v| v.record_id != "other"));

        store.touch_event("e1").await;
        let after = store.data_versions("t1").await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn basecamp_is_replaced_not_appended() {
        let store = InMemoryTripStore::new();
        let base = |name: &str| Place {
            id: name.to_lowercase(),
            trip_id: "t1".into(),
            name: name.into(),
            address: None,
            url: None,
            saved_at: Utc::now(),
            version: 1,
        };
        store.set_basecamp(base("Hotel A")).await;
        store.set_basecamp(base("Hotel B")).await;

        let basecamp = store.basecamp("t1").await.unwrap().unwrap();
        assert_eq!(basecamp.name, "Hotel B");
    }
}
