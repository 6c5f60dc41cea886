//! Bounded, TTL'd rewrite result cache.
//!
//! Shared across concurrent requests; a single mutex gives the
//! single-writer-per-key discipline the lookup/store pair needs. Expired
//! entries read as absent and are lazily purged on every access. Overflow
//! evicts the oldest-inserted entry — exactly one per overflow insert.

use std::collections::HashMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::level::ProcessingLevel;

/// Stable key over (transcript, level, model). Hashing keeps full
/// transcripts out of the map keys; length prefixes make the encoding
/// unambiguous across field boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn compute(transcript: &str, level: ProcessingLevel, model: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [transcript, level.as_str(), model] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().into())
    }
}

struct Entry {
    text: String,
    inserted_at: Instant,
}

pub struct RewriteCache {
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl RewriteCache {
    pub fn new(mut config: CacheConfig) -> Self {
        config.max_entries = config.max_entries.max(1);
        config.ttl = config.ttl.max(std::time::Duration::from_secs(1));
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::prune_expired(&mut entries, now, self.config.ttl);
        entries.get(key).map(|entry| entry.text.clone())
    }

    /// Store a rewrite result. Texts longer than `max_character_count`
    /// bypass storage entirely.
    pub fn put(&self, key: CacheKey, text: &str) {
        if text.chars().count() > self.config.max_character_count {
            return;
        }

        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::prune_expired(&mut entries, now, self.config.ttl);

        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            Self::evict_oldest(&mut entries);
        }

        entries.insert(
            key,
            Entry {
                text: text.to_string(),
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn prune_expired(
        entries: &mut HashMap<CacheKey, Entry>,
        now: Instant,
        ttl: std::time::Duration,
    ) {
        entries.retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
    }

    fn evict_oldest(entries: &mut HashMap<CacheKey, Entry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cache(max_entries: usize, ttl_secs: u64) -> RewriteCache {
        RewriteCache::new(CacheConfig {
            max_entries,
            ttl: Duration::from_secs(ttl_secs),
            max_character_count: 64,
        })
    }

    fn key(n: u32) -> CacheKey {
        CacheKey::compute(&format!("transcript {n}"), ProcessingLevel::Clean, "m")
    }

    #[test]
    fn key_is_stable_and_field_sensitive() {
        let a = CacheKey::compute("hello", ProcessingLevel::Clean, "m1");
        assert_eq!(a, CacheKey::compute("hello", ProcessingLevel::Clean, "m1"));
        assert_ne!(a, CacheKey::compute("hello", ProcessingLevel::Polish, "m1"));
        assert_ne!(a, CacheKey::compute("hello", ProcessingLevel::Clean, "m2"));
        // Boundary shifts must not collide ("ab"+"c" vs "a"+"bc").
        assert_ne!(
            CacheKey::compute("ab", ProcessingLevel::Clean, "c"),
            CacheKey::compute("a", ProcessingLevel::Clean, "bc"),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hit_before_ttl_miss_after() {
        let cache = cache(8, 10);
        cache.put(key(1), "cleaned");
        assert_eq!(cache.get(&key(1)), Some("cleaned".into()));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_evicts_exactly_one_entry() {
        let cache = cache(3, 600);
        for n in 0..3 {
            cache.put(key(n), "text");
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len(), 3);

        cache.put(key(3), "text");
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&key(3)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_inserted_is_the_victim() {
        let cache = cache(2, 600);
        cache.put(key(1), "first");
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.put(key(2), "second");
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.put(key(3), "third");

        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn rewrite_of_existing_key_does_not_evict() {
        let cache = cache(2, 600);
        cache.put(key(1), "first");
        cache.put(key(2), "second");
        cache.put(key(1), "first again");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1)), Some("first again".into()));
    }

    #[test]
    fn oversized_text_bypasses_storage() {
        let cache = cache(8, 600);
        cache.put(key(1), &"x".repeat(65));
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1)), None);
    }
}
