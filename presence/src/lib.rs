//! # Presence
//!
//! Decides whether an attendance punch is valid for its attendance type.
//!
//! An attendance type names a validation kind (`geo_polygon`, `wifi_ip`,
//! `route_waypoint`, `qr_code`) and carries JSON settings describing the
//! candidates to check against. A punch supplies [`Evidence`]: coordinates,
//! network addresses, a scanned code. [`ValidationEngine::validate`] picks
//! the strategy for the kind and returns its [`Verdict`].
//!
//! ## Modules
//!
//! - [`settings`]: typed, forgiving views of attendance type settings.
//! - [`strategies`]: one validator per kind.
//! - [`registry`]: kind → strategy constructor table.
//! - [`geo`]: point-in-polygon, haversine distance, CIDR matching.
//! - [`route_resolver`]: routed-path distance with local fallback.
//! - [`replay_guard`]: single-use code consumption.
//! - [`cache`]: in-memory and database-backed [`CacheStore`](traits::cache::CacheStore)s.
//! - [`clock`]: injectable time sources.
//!
//! ## Example
//!
//! ```no_run
//! use presence::{ValidationEngine, cache::MemoryCache, clock::SystemClock};
//! use presence::registry::StrategyContext;
//! use presence::settings::AttendanceTypeConfig;
//! use presence::types::Evidence;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), presence::error::PresenceError> {
//! let clock = Arc::new(SystemClock);
//! let cache = Arc::new(MemoryCache::new(clock.clone()));
//! let engine = ValidationEngine::from_context(StrategyContext::from_config(cache, clock));
//!
//! let office = AttendanceTypeConfig::new(
//!     "wifi_ip",
//!     serde_json::json!({"locations": [{"id": 1, "ip_ranges": ["10.0.0.0/8"]}]}),
//! );
//! let verdict = engine
//!     .validate(&office, &Evidence::new().with_remote_addr("10.1.2.3"))
//!     .await?;
//! assert!(verdict.success);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod error;
pub mod geo;
pub mod registry;
pub mod replay_guard;
pub mod route_resolver;
pub mod settings;
pub mod strategies;
pub mod traits;
pub mod types;

use crate::error::PresenceError;
use crate::registry::{StrategyContext, StrategyRegistry};
use crate::settings::AttendanceTypeConfig;
use crate::types::{Evidence, Verdict};
use tracing::debug;

/// Entry point: resolves the strategy for an attendance type and runs it.
///
/// Holds no per-request state. Concurrent calls only meet in the replay
/// cache.
pub struct ValidationEngine {
    registry: StrategyRegistry,
}

impl ValidationEngine {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub fn from_context(context: StrategyContext) -> Self {
        Self::new(StrategyRegistry::new(context))
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Validates one punch.
    ///
    /// Rule failures, including an unknown kind, come back as `Ok` with an
    /// unsuccessful [`Verdict`]. `Err` means a backend (the replay cache)
    /// failed and the punch could not be judged.
    pub async fn validate(
        &self,
        config: &AttendanceTypeConfig,
        evidence: &Evidence,
    ) -> Result<Verdict, PresenceError> {
        let strategy = match self.registry.resolve(&config.kind) {
            Ok(strategy) => strategy,
            Err(PresenceError::UnknownKind(kind)) => {
                return Ok(Verdict::misconfigured(format!(
                    "Unknown attendance type kind '{kind}'"
                ))
                .with("kind", kind));
            }
            Err(other) => return Err(other),
        };

        let verdict = strategy.validate(config, evidence).await?;
        debug!(
            kind = %strategy.kind(),
            success = verdict.success,
            status = verdict.status,
            message = %verdict.message,
            "Attendance validated"
        );
        Ok(verdict)
    }
}
