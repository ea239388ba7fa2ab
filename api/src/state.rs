use presence::ValidationEngine;
use presence::cache::DbCache;
use presence::clock::{Clock, SystemClock};
use presence::registry::StrategyContext;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared handles for request handlers.
///
/// Cloned per request; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<ValidationEngine>,
}

impl AppState {
    pub fn new(engine: ValidationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Engine backed by the `cache_entries` table and the configured
    /// routing service.
    pub fn from_db(db: DatabaseConnection) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(DbCache::new(db, clock.clone()));
        Self::new(ValidationEngine::from_context(StrategyContext::from_config(
            cache, clock,
        )))
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }
}
