//! Presence Error Types
//!
//! [`PresenceError`] covers the conditions that must reach the caller as real
//! errors. Everything a punch can legitimately fail on (missing evidence,
//! wrong place, reused code, misconfigured attendance type) is a
//! [`Verdict`](crate::types::Verdict) instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    /// The attendance type names a kind no strategy is registered for.
    /// `ValidationEngine` turns this into a 422 verdict.
    #[error("unknown attendance type kind '{0}'")]
    UnknownKind(String),

    /// The replay/route cache backend failed.
    #[error("cache unavailable: {0}")]
    Cache(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<sea_orm::DbErr> for PresenceError {
    fn from(err: sea_orm::DbErr) -> Self {
        PresenceError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for PresenceError {
    fn from(err: serde_json::Error) -> Self {
        PresenceError::Serialization(err.to_string())
    }
}
