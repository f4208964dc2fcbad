//! Demo seed data — a realistic trip for the CLI `ask` command and
//! end-to-end tests.

use chrono::{Duration, Utc};
use std::sync::Arc;

use wayfarer_core::records::{
    Balance, CalendarEvent, ChatMessage, Place, Poll, PollOption, Preference, Receipt, TaskItem,
};

use crate::InMemoryTripStore;

pub const DEMO_TRIP: &str = "lisbon-2026";
pub const DEMO_USERS: [&str; 3] = ["ana", "ben", "chris"];

/// Seed a store with the demo trip. Returns the trip id.
pub async fn seed(store: &Arc<InMemoryTripStore>) -> &'static str {
    let now = Utc::now();

    for user in DEMO_USERS {
        store.add_member(user, DEMO_TRIP).await;
    }

    store
        .add_event(CalendarEvent {
            id: "evt-fado".into(),
            trip_id: DEMO_TRIP.into(),
            title: "Fado show at Clube de Fado".into(),
            start: now + Duration::hours(30),
            end: Some(now + Duration::hours(32)),
            location: Some("Alfama".into()),
            version: 1,
        })
        .await;
    store
        .add_event(CalendarEvent {
            id: "evt-sintra".into(),
            trip_id: DEMO_TRIP.into(),
            title: "Day trip to Sintra".into(),
            start: now + Duration::hours(54),
            end: None,
            location: Some("Sintra".into()),
            version: 1,
        })
        .await;

    store
        .set_basecamp(Place {
            id: "basecamp".into(),
            trip_id: DEMO_TRIP.into(),
            name: "Casa do Principe".into(),
            address: Some("Praça do Príncipe Real 23, Lisbon".into()),
            url: None,
            saved_at: now - Duration::days(10),
            version: 1,
        })
        .await;
    store
        .add_place(Place {
            id: "place-timeout".into(),
            trip_id: DEMO_TRIP.into(),
            name: "Time Out Market".into(),
            address: Some("Av. 24 de Julho 49".into()),
            url: Some("https://www.timeoutmarket.com/lisboa".into()),
            saved_at: now - Duration::days(3),
            version: 1,
        })
        .await;

    store
        .add_message(ChatMessage {
            id: "msg-1".into(),
            trip_id: DEMO_TRIP.into(),
            sender_id: "ben".into(),
            text: "Dinner before the fado show? I heard Alfama has great spots".into(),
            sent_at: now - Duration::hours(5),
            version: 1,
        })
        .await;
    store
        .add_message(ChatMessage {
            id: "msg-2".into(),
            trip_id: DEMO_TRIP.into(),
            sender_id: "ana".into(),
            text: "Yes! Also we still owe Chris for the apartment".into(),
            sent_at: now - Duration::hours(4),
            version: 1,
        })
        .await;

    store
        .add_balance(Balance {
            id: "bal-1".into(),
            trip_id: DEMO_TRIP.into(),
            debtor_id: "ana".into(),
            creditor_id: "chris".into(),
            amount_cents: 8250,
            currency: "EUR".into(),
            updated_at: now - Duration::hours(4),
            version: 1,
        })
        .await;

    store
        .add_task(TaskItem {
            id: "task-tickets".into(),
            trip_id: DEMO_TRIP.into(),
            title: "Buy Sintra train tickets".into(),
            assignee_id: Some("ben".into()),
            done: false,
            due: Some(now + Duration::hours(48)),
            updated_at: now - Duration::hours(12),
            version: 1,
        })
        .await;

    store
        .add_poll(Poll {
            id: "poll-dinner".into(),
            trip_id: DEMO_TRIP.into(),
            question: "Where for dinner Friday?".into(),
            options: vec![
                PollOption { label: "Cervejaria Ramiro".into(), votes: 2 },
                PollOption { label: "Time Out Market".into(), votes: 1 },
            ],
            closed: false,
            updated_at: now - Duration::hours(8),
            version: 1,
        })
        .await;

    store
        .add_receipt(Receipt {
            id: "rcpt-1".into(),
            trip_id: DEMO_TRIP.into(),
            merchant: "Pastéis de Belém".into(),
            total_cents: 1840,
            currency: "EUR".into(),
            paid_by: "chris".into(),
            uploaded_at: now - Duration::hours(20),
            version: 1,
        })
        .await;

    store
        .add_preference(Preference {
            id: "pref-1".into(),
            trip_id: DEMO_TRIP.into(),
            user_id: "ana".into(),
            key: "diet".into(),
            value: "vegetarian".into(),
            updated_at: now - Duration::days(15),
            version: 1,
        })
        .await;

    DEMO_TRIP
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::store::{CalendarStore, MembershipStore};

    #[tokio::test]
    async fn seed_populates_members_and_events() {
        let store = Arc::new(InMemoryTripStore::new());
        let trip = seed(&store).await;

        assert!(store.is_active_member("ana", trip).await.unwrap());
        assert!(!store.is_active_member("mallory", trip).await.unwrap());

        let events = store.upcoming_events(trip).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].title.contains("Fado"));
    }
}
