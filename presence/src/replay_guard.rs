//! # Replay Guard
//!
//! Remembers which single-use codes have been consumed, so a printed or
//! screenshotted code cannot be punched twice.
//!
//! A token moves `unused -> used` and never back; the marker disappears
//! only when its retention TTL lapses. Markers live in the shared
//! [`CacheStore`] under `code_used:{token}`.
//!
//! [`try_consume`](ReplayGuard::try_consume) is the operation strategies
//! use. On stores whose `put_if_absent` is atomic it admits exactly one
//! consumer per token. On other stores it degrades to check-then-mark and
//! two simultaneous scans can both be admitted; the guard logs a warning
//! at construction when that is the case.

use crate::clock::Clock;
use crate::error::PresenceError;
use crate::traits::cache::CacheStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long consumption markers are kept.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// What is stored for a consumed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub used_by: Option<String>,
    pub used_at: DateTime<Utc>,
}

pub struct ReplayGuard {
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl ReplayGuard {
    pub fn new(cache: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        if !cache.supports_atomic() {
            warn!("Replay cache has no atomic put-if-absent; concurrent scans of one code may both pass");
        }
        Self {
            cache,
            clock,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn key(token_id: &str) -> String {
        format!("code_used:{token_id}")
    }

    pub async fn is_used(&self, token_id: &str) -> Result<bool, PresenceError> {
        self.cache.has(&Self::key(token_id)).await
    }

    /// Unconditionally records `token_id` as consumed.
    pub async fn mark_used(
        &self,
        token_id: &str,
        who: Option<&str>,
        when: DateTime<Utc>,
    ) -> Result<(), PresenceError> {
        let record = UsageRecord {
            used_by: who.map(str::to_string),
            used_at: when,
        };
        let value = serde_json::to_string(&record)?;
        self.cache
            .put(&Self::key(token_id), &value, self.retention)
            .await
    }

    /// Marks `token_id` consumed if nobody has yet. `true` means this caller
    /// is the consumer.
    pub async fn try_consume(&self, token_id: &str, who: Option<&str>) -> Result<bool, PresenceError> {
        let record = UsageRecord {
            used_by: who.map(str::to_string),
            used_at: self.clock.now(),
        };
        let value = serde_json::to_string(&record)?;
        let won = self
            .cache
            .put_if_absent(&Self::key(token_id), &value, self.retention)
            .await?;
        debug!(token = token_id, consumed = won, "Replay guard consume attempt");
        Ok(won)
    }

    /// Who consumed `token_id` and when, if it has been consumed.
    pub async fn usage(&self, token_id: &str) -> Result<Option<UsageRecord>, PresenceError> {
        match self.cache.get(&Self::key(token_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).ok()),
            None => Ok(None),
        }
    }
}
