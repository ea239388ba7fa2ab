use crate::error::PresenceError;
use async_trait::async_trait;
use std::time::Duration;

/// A shared key/value store with per-entry TTL.
///
/// Entries past their TTL must read as absent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PresenceError>;

    async fn get(&self, key: &str) -> Result<Option<String>, PresenceError>;

    async fn has(&self, key: &str) -> Result<bool, PresenceError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Stores `value` only if `key` is absent. Returns `true` when this call
    /// stored it.
    ///
    /// The default is `has` followed by `put` and is **not** atomic: two
    /// callers can both observe the key missing and both return `true`.
    /// Stores that can do better override this and report
    /// [`supports_atomic`](Self::supports_atomic).
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, PresenceError> {
        if self.has(key).await? {
            return Ok(false);
        }
        self.put(key, value, ttl).await?;
        Ok(true)
    }

    /// Whether `put_if_absent` is a true compare-and-set.
    fn supports_atomic(&self) -> bool {
        false
    }
}
