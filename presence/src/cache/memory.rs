use super::expiry_from;
use crate::clock::Clock;
use crate::error::PresenceError;
use crate::traits::cache::CacheStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process cache. Every operation holds one lock, which makes
/// `put_if_absent` a real compare-and-set.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Drops dead entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PresenceError> {
        let expires_at = expiry_from(self.clock.now(), ttl);
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PresenceError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(e) if e.expires_at > now => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, PresenceError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|e| e.expires_at > now) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry_from(now, ttl),
            },
        );
        Ok(true)
    }

    fn supports_atomic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn setup() -> (Arc<FixedClock>, MemoryCache) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        ));
        let cache = MemoryCache::new(clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn entries_expire_with_the_clock() {
        let (clock, cache) = setup();
        cache.put("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(61));
        assert!(!cache.has("k").await.unwrap());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn put_if_absent_respects_live_and_dead_entries() {
        let (clock, cache) = setup();
        let ttl = Duration::from_secs(10);
        assert!(cache.put_if_absent("k", "a", ttl).await.unwrap());
        assert!(!cache.put_if_absent("k", "b", ttl).await.unwrap());

        clock.advance(chrono::Duration::seconds(11));
        assert!(cache.put_if_absent("k", "c", ttl).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn concurrent_put_if_absent_has_one_winner() {
        let (_clock, cache) = setup();
        let cache = Arc::new(cache);
        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .put_if_absent("code_used:1", &i.to_string(), Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_dead_entries() {
        let (clock, cache) = setup();
        cache.put("short", "1", Duration::from_secs(5)).await.unwrap();
        cache.put("long", "2", Duration::from_secs(500)).await.unwrap();
        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.has("long").await.unwrap());
    }
}
