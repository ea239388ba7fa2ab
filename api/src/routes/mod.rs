//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness plus routing-service reachability
//! - `/attendance` → punch validation

use crate::routes::{attendance::attendance_routes, health::health_routes};
use crate::state::AppState;
use axum::Router;

pub mod attendance;
pub mod health;

/// Builds the `/api` router with its state applied.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/attendance", attendance_routes())
        .with_state(app_state)
}
