//! # Cache Stores
//!
//! [`CacheStore`](crate::traits::cache::CacheStore) backends.
//!
//! - [`memory`]: process-local map, atomic under a mutex. Good for a single
//!   instance and for tests.
//! - [`sql`]: the `cache_entries` table, atomic across every process sharing
//!   the database.

pub mod sql;
pub mod memory;

pub use self::sql::DbCache;
pub use self::memory::MemoryCache;

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// `now + ttl`, saturating instead of overflowing on absurd TTLs.
pub(crate) fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
