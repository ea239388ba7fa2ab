use super::expiry_from;
use crate::clock::Clock;
use crate::error::PresenceError;
use crate::traits::cache::CacheStore;
use async_trait::async_trait;
use db::models::cache_entry::Model as CacheEntry;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

/// Cache persisted in the `cache_entries` table.
///
/// `put_if_absent` leans on the table's primary key, so it stays atomic
/// across processes that share the database.
#[derive(Clone)]
pub struct DbCache {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl DbCache {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn purge_expired(&self) -> Result<u64, PresenceError> {
        Ok(CacheEntry::purge_expired(&self.db, self.clock.now()).await?)
    }
}

#[async_trait]
impl CacheStore for DbCache {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PresenceError> {
        let now = self.clock.now();
        CacheEntry::upsert(&self.db, key, value, expiry_from(now, ttl), now).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PresenceError> {
        let row = CacheEntry::find_live(&self.db, key, self.clock.now()).await?;
        Ok(row.map(|r| r.value))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, PresenceError> {
        let now = self.clock.now();
        Ok(CacheEntry::insert_if_absent(&self.db, key, value, expiry_from(now, ttl), now).await?)
    }

    fn supports_atomic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use db::test_utils::setup_test_db;

    async fn setup() -> (Arc<FixedClock>, DbCache) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        ));
        let cache = DbCache::new(setup_test_db().await, clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn round_trips_and_expires() {
        let (clock, cache) = setup().await;
        cache.put("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::minutes(2));
        assert!(!cache.has("k").await.unwrap());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn put_if_absent_is_single_winner() {
        let (clock, cache) = setup().await;
        let ttl = Duration::from_secs(30);
        assert!(cache.put_if_absent("code_used:5", "a", ttl).await.unwrap());
        assert!(!cache.put_if_absent("code_used:5", "b", ttl).await.unwrap());

        clock.advance(chrono::Duration::minutes(1));
        assert!(cache.put_if_absent("code_used:5", "c", ttl).await.unwrap());
        assert!(cache.supports_atomic());
    }
}
