use api::{middleware::log_request, routes::routes, state::AppState};
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::from_fn,
};
use db::test_utils::setup_test_db;
use presence::ValidationEngine;
use presence::cache::MemoryCache;
use presence::clock::{Clock, SystemClock};
use presence::registry::StrategyContext;
use presence::replay_guard::ReplayGuard;
use presence::route_resolver::RouteResolver;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

fn wrap(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes(state))
        .layer(from_fn(log_request))
}

/// App over an in-memory replay cache and no routing service.
pub fn make_test_app() -> Router {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(MemoryCache::new(clock.clone()));
    let engine = ValidationEngine::from_context(StrategyContext::new(
        clock.clone(),
        Arc::new(ReplayGuard::new(cache, clock)),
        Arc::new(RouteResolver::offline()),
    ));
    wrap(AppState::new(engine))
}

/// App wired the way the binary wires it, over a migrated in-memory SQLite.
pub async fn make_db_app() -> Router {
    let db = setup_test_db().await;
    wrap(AppState::from_db(db))
}

/// Sends one request from `peer` and returns the status and JSON body.
pub async fn send(app: &Router, req: Request<Body>, peer: &str) -> (StatusCode, Value) {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut req = req;
    req.extensions_mut().insert(ConnectInfo(peer));

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}
