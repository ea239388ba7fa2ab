use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use util::{config, http::is_url_alive};

/// Builds the `/health` route group.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub routing_service: RoutingServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct RoutingServiceHealth {
    pub url: String,
    pub reachable: bool,
}

/// GET /health
///
/// Always `200 OK` while the process serves requests. The routing service
/// probe is informational: route checks fall back to waypoint distances
/// when it is down.
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "status": "OK",
///     "routing_service": { "url": "https://router.project-osrm.org", "reachable": true }
///   },
///   "message": "Health check passed"
/// }
/// ```
pub async fn health_check() -> impl IntoResponse {
    let url = config::routing_service_url();
    let reachable = is_url_alive(&url, config::routing_timeout_secs()).await;

    Json(ApiResponse::success(
        HealthResponse {
            status: "OK",
            routing_service: RoutingServiceHealth { url, reachable },
        },
        "Health check passed",
    ))
}
