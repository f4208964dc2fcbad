//! The context aggregator.
//!
//! # Determinism
//!
//! Aggregation is deterministic for a fixed store state: ranking uses only
//! source priority and record timestamps, and the fingerprint is computed
//! from sorted `(id, version)` pairs. Identical inputs produce identical
//! bundles.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use wayfarer_config::ContextConfig;
use wayfarer_core::context::{ContextBundle, ContextFragment};
use wayfarer_core::error::{Error, Result, StoreError};
use wayfarer_core::store::{ContextStores, RecordVersion, VersionStore};

use crate::fingerprint::fingerprint_of;
use crate::render;

/// Aggregates adapter reads into a bounded, prioritized context bundle.
/// Stateless — create one and share it across requests.
pub struct ContextAggregator {
    stores: ContextStores,
    versions: Arc<dyn VersionStore>,
    config: ContextConfig,
}

impl ContextAggregator {
    pub fn new(stores: ContextStores, versions: Arc<dyn VersionStore>, config: ContextConfig) -> Self {
        Self { stores, versions, config }
    }

    /// Current context fingerprint for a trip, without reading any context
    /// adapter. Used for the pre-aggregation cache lookup.
    pub async fn fingerprint(&self, trip_id: &str) -> Result<String> {
        let versions = self.versions.data_versions(trip_id).await?;
        Ok(fingerprint_of(&versions))
    }

    /// Resolve a query into a context bundle.
    ///
    /// The caller (the gateway) has already verified membership; `user_id`
    /// is only used for security-event logging here.
    pub async fn aggregate(
        &self,
        user_id: &str,
        trip_id: &str,
        query_text: &str,
    ) -> Result<ContextBundle> {
        let _ = query_text; // all adapters are queried; irrelevant ones return empty
        let per_adapter = Duration::from_millis(self.config.adapter_timeout_ms);
        let mut failed = 0usize;

        let (chat, calendar, payments, places, tasks, polls, receipts, preferences, versions) = tokio::join!(
            timeout(
                per_adapter,
                self.stores.chat.recent_messages(trip_id, self.config.chat_message_limit)
            ),
            timeout(per_adapter, self.stores.calendar.upcoming_events(trip_id)),
            timeout(per_adapter, self.stores.payments.open_balances(trip_id)),
            timeout(per_adapter, async {
                let basecamp = self.stores.places.basecamp(trip_id).await?;
                let saved = self.stores.places.saved_places(trip_id).await?;
                Ok::<_, StoreError>((basecamp, saved))
            }),
            timeout(per_adapter, self.stores.tasks.open_tasks(trip_id)),
            timeout(per_adapter, self.stores.polls.open_polls(trip_id)),
            timeout(
                per_adapter,
                self.stores.receipts.recent_receipts(trip_id, self.config.receipt_limit)
            ),
            timeout(per_adapter, self.stores.preferences.preferences(trip_id)),
            timeout(per_adapter, self.versions.data_versions(trip_id)),
        );

        let chat = unpack("chat", chat, &mut failed).unwrap_or_default();
        let events = unpack("calendar", calendar, &mut failed).unwrap_or_default();
        let balances = unpack("payments", payments, &mut failed).unwrap_or_default();
        let (basecamp, saved_places) =
            unpack("places", places, &mut failed).unwrap_or((None, Vec::new()));
        let tasks = unpack("tasks", tasks, &mut failed).unwrap_or_default();
        let polls = unpack("polls", polls, &mut failed).unwrap_or_default();
        let receipts = unpack("receipts", receipts, &mut failed).unwrap_or_default();
        let preferences = unpack("preferences", preferences, &mut failed).unwrap_or_default();

        let total = ContextStores::ADAPTER_COUNT;
        if failed * 2 > total {
            warn!(
                trip_id = %trip_id,
                failed,
                total,
                "Context aggregation below safety floor"
            );
            return Err(Error::ContextUnavailable { responsive: total - failed, total });
        }

        // Defense in depth: adapters enforce tenant scoping themselves, but
        // we never trust their output blindly. Any record carrying a
        // different trip id is discarded and logged as a security event.
        let chat = retain_tenant(chat, trip_id, user_id, "chat", |m| &m.trip_id);
        let events = retain_tenant(events, trip_id, user_id, "calendar", |e| &e.trip_id);
        let balances = retain_tenant(balances, trip_id, user_id, "payments", |b| &b.trip_id);
        let basecamp = basecamp.filter(|p| {
            let ok = p.trip_id == trip_id;
            if !ok {
                log_tenant_mismatch("places", &p.id, trip_id, user_id);
            }
            ok
        });
        let saved_places = retain_tenant(saved_places, trip_id, user_id, "places", |p| &p.trip_id);
        let tasks = retain_tenant(tasks, trip_id, user_id, "tasks", |t| &t.trip_id);
        let polls = retain_tenant(polls, trip_id, user_id, "polls", |p| &p.trip_id);
        let receipts = retain_tenant(receipts, trip_id, user_id, "receipts", |r| &r.trip_id);
        let preferences =
            retain_tenant(preferences, trip_id, user_id, "preferences", |p| &p.trip_id);

        // Render everything into trust-tagged fragments.
        let mut fragments: Vec<ContextFragment> = Vec::new();
        fragments.extend(events.iter().map(render::event));
        if let Some(b) = &basecamp {
            fragments.push(render::basecamp(b));
        }
        fragments.extend(saved_places.iter().map(render::place));
        fragments.extend(chat.iter().map(render::chat));
        fragments.extend(balances.iter().map(render::balance));
        fragments.extend(tasks.iter().map(render::task));
        fragments.extend(polls.iter().map(render::poll));
        fragments.extend(polls.iter().filter_map(render::poll_assumption));
        fragments.extend(receipts.iter().map(render::receipt));
        fragments.extend(preferences.iter().map(render::preference));

        // Rank: source priority first, most recent first within a source.
        fragments.sort_by(|a, b| {
            a.source
                .priority()
                .cmp(&b.source.priority())
                .then(b.recency.cmp(&a.recency))
        });

        // Greedy fill to the hard ceiling. The loop stops at the first
        // fragment that does not fit — the budget is enforced here, before
        // any provider call, never after.
        let budget = self.config.char_budget;
        let available = fragments.len();
        let mut included: Vec<ContextFragment> = Vec::new();
        let mut used = 0usize;
        for fragment in fragments {
            let len = fragment.char_len();
            if used + len > budget {
                break;
            }
            used += len;
            included.push(fragment);
        }
        if included.len() < available {
            debug!(
                trip_id = %trip_id,
                included = included.len(),
                available,
                used,
                budget,
                "Context bundle truncated to character budget"
            );
        }

        // Fingerprint from the version probe when it responded; otherwise
        // fall back to the versions of the records we actually retrieved.
        let fingerprint = match versions {
            Ok(Ok(versions)) => fingerprint_of(&versions),
            _ => {
                let pairs: Vec<RecordVersion> = included
                    .iter()
                    .map(|f| RecordVersion {
                        record_id: f.record_id.clone(),
                        version: f.record_version,
                    })
                    .collect();
                fingerprint_of(&pairs)
            }
        };

        Ok(ContextBundle {
            trip_id: trip_id.to_string(),
            fragments: included,
            char_budget: budget,
            fingerprint,
        })
    }
}

/// Flatten a timed adapter read, counting timeouts and store errors as one
/// failed adapter each.
fn unpack<T>(
    adapter: &str,
    result: std::result::Result<std::result::Result<T, StoreError>, tokio::time::error::Elapsed>,
    failed: &mut usize,
) -> Option<T> {
    match result {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(adapter = %adapter, error = %e, "Context adapter read failed");
            *failed += 1;
            None
        }
        Err(_) => {
            warn!(adapter = %adapter, "Context adapter read timed out");
            *failed += 1;
            None
        }
    }
}

fn retain_tenant<T>(
    records: Vec<T>,
    trip_id: &str,
    user_id: &str,
    source: &str,
    get_trip: impl Fn(&T) -> &str,
) -> Vec<T> {
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if get_trip(&record) == trip_id {
            kept.push(record);
        } else {
            log_tenant_mismatch(source, get_trip(&record), trip_id, user_id);
        }
    }
    kept
}

fn log_tenant_mismatch(source: &str, found: &str, expected: &str, user_id: &str) {
    warn!(
        source = %source,
        expected_trip = %expected,
        found_trip = %found,
        user_id = %user_id,
        "SECURITY: cross-tenant record discarded from adapter output"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use wayfarer_core::context::ContextSource;
    use wayfarer_core::records::*;
    use wayfarer_core::store::*;
    use wayfarer_stores::{InMemoryTripStore, demo};

    fn config() -> ContextConfig {
        ContextConfig { adapter_timeout_ms: 200, ..ContextConfig::default() }
    }

    async fn seeded() -> (Arc<InMemoryTripStore>, ContextAggregator) {
        let store = Arc::new(InMemoryTripStore::new());
        demo::seed(&store).await;
        let aggregator = ContextAggregator::new(store.stores(), store.clone(), config());
        (store, aggregator)
    }

    #[tokio::test]
    async fn bundle_orders_calendar_first() {
        let (_, aggregator) = seeded().await;
        let bundle = aggregator
            .aggregate("ana", demo::DEMO_TRIP, "what time is the fado show")
            .await
            .unwrap();

        assert!(!bundle.is_empty());
        assert_eq!(bundle.fragments[0].source, ContextSource::Calendar);
        assert!(bundle.sources_used().contains(&"calendar".to_string()));
        assert!(bundle.sources_used().contains(&"chat".to_string()));
    }

    #[tokio::test]
    async fn budget_is_a_hard_ceiling() {
        let store = Arc::new(InMemoryTripStore::new());
        demo::seed(&store).await;
        // Flood chat with large messages
        for i in 0..100 {
            store
                .add_message(ChatMessage {
                    id: format!("flood-{i}"),
                    trip_id: demo::DEMO_TRIP.into(),
                    sender_id: "ben".into(),
                    text: "x".repeat(400),
                    sent_at: Utc::now(),
                    version: 1,
                })
                .await;
        }
        let aggregator = ContextAggregator::new(
            store.stores(),
            store.clone(),
            ContextConfig { char_budget: 500, adapter_timeout_ms: 200, ..ContextConfig::default() },
        );

        let bundle = aggregator.aggregate("ana", demo::DEMO_TRIP, "anything").await.unwrap();
        assert!(bundle.total_chars() <= 500);
        // Highest-priority source still present
        assert_eq!(bundle.fragments[0].source, ContextSource::Calendar);
    }

    #[tokio::test]
    async fn assumptions_rank_last() {
        let (_, aggregator) = seeded().await;
        let bundle = aggregator
            .aggregate("ana", demo::DEMO_TRIP, "where should we eat")
            .await
            .unwrap();

        let inferred_pos = bundle
            .fragments
            .iter()
            .position(|f| f.source == ContextSource::Inferred)
            .expect("open poll should yield one labeled assumption");
        assert!(bundle.fragments[inferred_pos].assumed);
        assert_eq!(inferred_pos, bundle.fragments.len() - 1);
    }

    #[tokio::test]
    async fn fingerprint_changes_when_a_record_changes() {
        let (store, aggregator) = seeded().await;
        let before = aggregator.fingerprint(demo::DEMO_TRIP).await.unwrap();
        let bundle = aggregator.aggregate("ana", demo::DEMO_TRIP, "q").await.unwrap();
        assert_eq!(bundle.fingerprint, before);

        store.touch_event("evt-fado").await;
        let after = aggregator.fingerprint(demo::DEMO_TRIP).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn deterministic_for_fixed_state() {
        let (_, aggregator) = seeded().await;
        let a = aggregator.aggregate("ana", demo::DEMO_TRIP, "q").await.unwrap();
        let b = aggregator.aggregate("ana", demo::DEMO_TRIP, "q").await.unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(
            a.fragments.iter().map(|f| &f.content).collect::<Vec<_>>(),
            b.fragments.iter().map(|f| &f.content).collect::<Vec<_>>()
        );
    }

    // --- Adversarial adapter: returns records for the wrong trip ---

    struct CrossTenantChat;

    #[async_trait]
    impl ChatStore for CrossTenantChat {
        async fn recent_messages(
            &self,
            _trip_id: &str,
            _limit: usize,
        ) -> std::result::Result<Vec<ChatMessage>, StoreError> {
            Ok(vec![ChatMessage {
                id: "leak-1".into(),
                trip_id: "someone-elses-trip".into(),
                sender_id: "mallory".into(),
                text: "their private plans".into(),
                sent_at: Utc::now(),
                version: 1,
            }])
        }
    }

    #[tokio::test]
    async fn cross_tenant_records_are_discarded() {
        let store = Arc::new(InMemoryTripStore::new());
        demo::seed(&store).await;
        let mut stores = store.stores();
        stores.chat = Arc::new(CrossTenantChat);
        let aggregator = ContextAggregator::new(stores, store.clone(), config());

        let bundle = aggregator.aggregate("ana", demo::DEMO_TRIP, "q").await.unwrap();
        assert!(bundle.fragments.iter().all(|f| !f.content.contains("private plans")));
        assert!(!bundle.sources_used().contains(&"chat".to_string()));
    }

    // --- Hanging adapters for the safety floor ---

    struct Hang;

    #[async_trait]
    impl ChatStore for Hang {
        async fn recent_messages(
            &self,
            _: &str,
            _: usize,
        ) -> std::result::Result<Vec<ChatMessage>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
    }

    #[async_trait]
    impl PaymentsStore for Hang {
        async fn open_balances(&self, _: &str) -> std::result::Result<Vec<Balance>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
    }

    #[async_trait]
    impl TasksStore for Hang {
        async fn open_tasks(&self, _: &str) -> std::result::Result<Vec<TaskItem>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
    }

    #[async_trait]
    impl PollsStore for Hang {
        async fn open_polls(&self, _: &str) -> std::result::Result<Vec<Poll>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
    }

    #[async_trait]
    impl ReceiptsStore for Hang {
        async fn recent_receipts(
            &self,
            _: &str,
            _: usize,
        ) -> std::result::Result<Vec<Receipt>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn majority_timeout_returns_context_unavailable() {
        let store = Arc::new(InMemoryTripStore::new());
        demo::seed(&store).await;
        let hang = Arc::new(Hang);
        let mut stores = store.stores();
        // 5 of 8 adapters hang
        stores.chat = hang.clone();
        stores.payments = hang.clone();
        stores.tasks = hang.clone();
        stores.polls = hang.clone();
        stores.receipts = hang.clone();
        let aggregator = ContextAggregator::new(
            stores,
            store.clone(),
            ContextConfig { adapter_timeout_ms: 50, ..ContextConfig::default() },
        );

        let err = aggregator.aggregate("ana", demo::DEMO_TRIP, "q").await.unwrap_err();
        match err {
            Error::ContextUnavailable { responsive, total } => {
                assert_eq!(responsive, 3);
                assert_eq!(total, 8);
            }
            other => panic!("expected ContextUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exactly_half_failing_still_aggregates() {
        let store = Arc::new(InMemoryTripStore::new());
        demo::seed(&store).await;
        let hang = Arc::new(Hang);
        let mut stores = store.stores();
        // 4 of 8 adapters hang — not "more than half"
        stores.chat = hang.clone();
        stores.payments = hang.clone();
        stores.tasks = hang.clone();
        stores.polls = hang.clone();
        let aggregator = ContextAggregator::new(
            stores,
            store.clone(),
            ContextConfig { adapter_timeout_ms: 50, ..ContextConfig::default() },
        );

        let bundle = aggregator.aggregate("ana", demo::DEMO_TRIP, "q").await.unwrap();
        // Calendar still responded
        assert!(bundle.sources_used().contains(&"calendar".to_string()));
    }
}
