//! Response cache — `(tripId, normalized query, context fingerprint)` → answer.
//!
//! The context fingerprint is part of the key, so any change to a
//! contributing record silently invalidates the entry: no invalidation
//! messages needed. A near-miss on query wording may be promoted to a hit
//! by token overlap, but only when the fingerprints are identical —
//! similarity never substitutes for differing context.
//!
//! Entries are bounded per trip and evicted oldest-first. A cache store
//! error is always treated as a miss by callers, never a request failure.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use wayfarer_config::CacheConfig;
use wayfarer_core::error::CacheError;

/// A cached answer with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub answer: String,
    pub sources_used: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub fingerprint: String,
}

/// Outcome of one lookup.
#[derive(Debug, Clone)]
pub enum Lookup {
    Hit(CacheEntry),
    /// An entry exists for this trip and query text but its fingerprint no
    /// longer matches current data. Must be treated as a miss.
    Stale,
    Miss,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    key: String,
    normalized_text: String,
    entry: CacheEntry,
}

/// In-memory response cache, keyed by trip for structural contention
/// isolation across tenants.
pub struct ResponseCache {
    config: CacheConfig,
    trips: RwLock<HashMap<String, Vec<StoredEntry>>>,
}

/// Cache key: SHA-256 over the three components, base64-encoded.
pub fn cache_key(trip_id: &str, normalized_text: &str, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(trip_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized_text.as_bytes());
    hasher.update([0u8]);
    hasher.update(fingerprint.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            trips: RwLock::new(HashMap::new()),
        }
    }

    /// Look up an answer for `(trip, normalized query, current fingerprint)`.
    pub fn lookup(
        &self,
        trip_id: &str,
        normalized_text: &str,
        fingerprint: &str,
    ) -> Result<Lookup, CacheError> {
        let key = cache_key(trip_id, normalized_text, fingerprint);
        let now = Utc::now();

        let trips = self
            .trips
            .read()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        let Some(entries) = trips.get(trip_id) else {
            return Ok(Lookup::Miss);
        };

        // Exact key match first
        if let Some(stored) = entries.iter().find(|e| e.key == key) {
            if stored.entry.expires_at <= now {
                return Ok(Lookup::Miss);
            }
            return Ok(Lookup::Hit(stored.entry.clone()));
        }

        // Same wording with a different fingerprint means the underlying
        // data changed: report stale so the audit record can say so.
        if entries
            .iter()
            .any(|e| e.normalized_text == normalized_text && e.entry.fingerprint != fingerprint)
        {
            return Ok(Lookup::Stale);
        }

        // Optional similarity promotion, gated on an identical fingerprint.
        if self.config.similarity_promotion {
            let best = entries
                .iter()
                .filter(|e| e.entry.fingerprint == fingerprint && e.entry.expires_at > now)
                .map(|e| (token_overlap(normalized_text, &e.normalized_text), e))
                .filter(|(overlap, _)| *overlap >= self.config.similarity_threshold)
                .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((overlap, stored)) = best {
                debug!(trip_id = %trip_id, overlap, "Similarity promotion to cache hit");
                return Ok(Lookup::Hit(stored.entry.clone()));
            }
        }

        Ok(Lookup::Miss)
    }

    /// Store an answer. Replaces any entry with the same key, then evicts
    /// oldest-first past the per-trip cap.
    pub fn store(
        &self,
        trip_id: &str,
        normalized_text: &str,
        fingerprint: &str,
        answer: String,
        sources_used: Vec<String>,
    ) -> Result<(), CacheError> {
        let key = cache_key(trip_id, normalized_text, fingerprint);
        let now = Utc::now();
        let entry = CacheEntry {
            answer,
            sources_used,
            created_at: now,
            expires_at: now + Duration::seconds(self.config.ttl_seconds as i64),
            fingerprint: fingerprint.to_string(),
        };

        let mut trips = self
            .trips
            .write()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        let entries = trips.entry(trip_id.to_string()).or_default();

        entries.retain(|e| e.key != key);
        entries.push(StoredEntry {
            key,
            normalized_text: normalized_text.to_string(),
            entry,
        });

        // Oldest-first eviction; entries are in insertion order.
        while entries.len() > self.config.max_entries_per_trip {
            entries.remove(0);
        }

        Ok(())
    }

    /// Entry count for one trip. Diagnostic only.
    pub fn len(&self, trip_id: &str) -> usize {
        self.trips
            .read()
            .map(|t| t.get(trip_id).map_or(0, |v| v.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, trip_id: &str) -> bool {
        self.len(trip_id) == 0
    }
}

/// Jaccard-style token overlap of two normalized texts, 0.0–1.0.
fn token_overlap(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ResponseCache {
        ResponseCache::new(CacheConfig::default())
    }

    fn small_cache(max_entries: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            max_entries_per_trip: max_entries,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn exact_hit_after_store() {
        let cache = cache();
        cache
            .store("t1", "what time is the show", "fp1", "8pm".into(), vec!["calendar".into()])
            .unwrap();

        match cache.lookup("t1", "what time is the show", "fp1").unwrap() {
            Lookup::Hit(entry) => {
                assert_eq!(entry.answer, "8pm");
                assert_eq!(entry.sources_used, vec!["calendar"]);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn changed_fingerprint_is_stale_not_hit() {
        let cache = cache();
        cache
            .store("t1", "what time is the show", "fp1", "8pm".into(), vec![])
            .unwrap();

        match cache.lookup("t1", "what time is the show", "fp2").unwrap() {
            Lookup::Stale => {}
            other => panic!("expected stale, got {other:?}"),
        }
    }

    #[test]
    fn cross_trip_isolation() {
        let cache = cache();
        cache.store("t1", "where is basecamp", "fp1", "Hotel A".into(), vec![]).unwrap();
        assert!(matches!(
            cache.lookup("t2", "where is basecamp", "fp1").unwrap(),
            Lookup::Miss
        ));
    }

    #[test]
    fn similarity_promotion_with_same_fingerprint() {
        let cache = cache();
        cache
            .store("t1", "what time does the show start", "fp1", "8pm".into(), vec![])
            .unwrap();

        // 4 of 5 tokens shared, same fingerprint → promoted
        match cache.lookup("t1", "what time does the show begin", "fp1").unwrap() {
            Lookup::Hit(entry) => assert_eq!(entry.answer, "8pm"),
            other => panic!("expected promoted hit, got {other:?}"),
        }
    }

    #[test]
    fn similarity_never_crosses_fingerprints() {
        let cache = cache();
        cache
            .store("t1", "what time does the show start", "fp1", "8pm".into(), vec![])
            .unwrap();

        let result = cache.lookup("t1", "what time does the show begin", "fp2").unwrap();
        assert!(!matches!(result, Lookup::Hit(_)));
    }

    #[test]
    fn low_overlap_is_a_miss() {
        let cache = cache();
        cache.store("t1", "what time does the show start", "fp1", "8pm".into(), vec![]).unwrap();
        assert!(matches!(
            cache.lookup("t1", "who owes money", "fp1").unwrap(),
            Lookup::Miss
        ));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = ResponseCache::new(CacheConfig {
            ttl_seconds: 0,
            similarity_promotion: false,
            ..CacheConfig::default()
        });
        cache.store("t1", "q", "fp1", "a".into(), vec![]).unwrap();
        assert!(matches!(cache.lookup("t1", "q", "fp1").unwrap(), Lookup::Miss));
    }

    #[test]
    fn oldest_first_eviction_at_cap() {
        let cache = small_cache(3);
        for i in 0..5 {
            cache
                .store("t1", &format!("query number {i}"), "fp1", format!("answer {i}"), vec![])
                .unwrap();
        }
        assert_eq!(cache.len("t1"), 3);
        // Oldest two evicted
        assert!(matches!(cache.lookup("t1", "query number 0", "fp1").unwrap(), Lookup::Miss));
        assert!(matches!(cache.lookup("t1", "query number 4", "fp1").unwrap(), Lookup::Hit(_)));
    }

    #[test]
    fn restore_same_key_replaces() {
        let cache = small_cache(10);
        cache.store("t1", "q", "fp1", "old".into(), vec![]).unwrap();
        cache.store("t1", "q", "fp1", "new".into(), vec![]).unwrap();
        assert_eq!(cache.len("t1"), 1);
        match cache.lookup("t1", "q", "fp1").unwrap() {
            Lookup::Hit(entry) => assert_eq!(entry.answer, "new"),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn key_depends_on_all_components() {
        let base = cache_key("t1", "q", "fp");
        assert_ne!(base, cache_key("t2", "q", "fp"));
        assert_ne!(base, cache_key("t1", "q2", "fp"));
        assert_ne!(base, cache_key("t1", "q", "fp2"));
        assert_eq!(base, cache_key("t1", "q", "fp"));
    }

    #[test]
    fn token_overlap_bounds() {
        assert!((token_overlap("a b c", "a b c") - 1.0).abs() < f64::EPSILON);
        assert!(token_overlap("a b", "c d") < f64::EPSILON);
        assert!(token_overlap("", "a") < f64::EPSILON);
        let half = token_overlap("a b c d", "a b x y");
        assert!(half > 0.3 && half < 0.4); // 2 shared / 6 union
    }
}
