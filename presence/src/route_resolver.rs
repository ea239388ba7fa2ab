//! # Route Resolver
//!
//! Decides whether a point lies near a route given as ordered waypoints.
//!
//! The routed path comes from an OSRM-compatible service
//! ([`OsrmClient`]). When the service is missing, slow, failing or returns
//! nothing usable, the resolver measures against the waypoints themselves.
//! [`RouteResolver::check`] therefore never fails; the outcome records
//! which path was taken.
//!
//! Successful geometries are memoized in the shared [`CacheStore`] under
//! `route_geometry:{lng,lat;...}`.

use crate::geo::nearest;
use crate::traits::cache::CacheStore;
use crate::traits::routing::{RouteError, RouteGeometry, RoutingService};
use crate::types::Coordinate;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on a single routing request.
pub const MAX_ROUTING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retention for memoized geometries.
pub const DEFAULT_ROUTE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// `lng,lat;lng,lat;...`, the waypoint encoding OSRM expects.
pub fn encode_waypoints(waypoints: &[Coordinate]) -> String {
    waypoints
        .iter()
        .map(|c| format!("{},{}", c.lng, c.lat))
        .collect::<Vec<_>>()
        .join(";")
}

// ---------------------------------------------------------------------------
// OSRM client
// ---------------------------------------------------------------------------

/// HTTP client for the OSRM `route` service.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

impl OsrmClient {
    /// `timeout` is clamped to `1s..=10s`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RouteError> {
        let timeout = timeout.clamp(Duration::from_secs(1), MAX_ROUTING_TIMEOUT);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouteError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Uses `ROUTING_SERVICE_URL` and `ROUTING_TIMEOUT_SECS`.
    pub fn from_config() -> Result<Self, RouteError> {
        Self::new(
            util::config::routing_service_url(),
            Duration::from_secs(util::config::routing_timeout_secs()),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn route_url(&self, waypoints: &[Coordinate]) -> String {
        format!(
            "{}/route/v1/driving/{}?overview=full&geometries=geojson",
            self.base_url,
            encode_waypoints(waypoints)
        )
    }

    fn geometry_from(body: OsrmResponse) -> Result<RouteGeometry, RouteError> {
        if let Some(code) = body.code.as_deref() {
            if !code.eq_ignore_ascii_case("ok") {
                let detail = body.message.unwrap_or_else(|| code.to_string());
                return Err(RouteError::Service(detail));
            }
        }

        let route = body.routes.into_iter().next().ok_or(RouteError::EmptyGeometry)?;
        let coordinates: Vec<Coordinate> = route
            .geometry
            .coordinates
            .iter()
            .filter_map(|pair| match pair.as_slice() {
                [lng, lat, ..] => Some(Coordinate::new(*lat, *lng)),
                _ => None,
            })
            .filter(Coordinate::is_valid)
            .collect();

        if coordinates.is_empty() {
            return Err(RouteError::EmptyGeometry);
        }

        Ok(RouteGeometry {
            coordinates,
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}

#[async_trait]
impl RoutingService for OsrmClient {
    async fn route(&self, waypoints: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::TooFewWaypoints(waypoints.len()));
        }

        let resp = self
            .client
            .get(self.route_url(waypoints))
            .send()
            .await
            .map_err(|e| RouteError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RouteError::Status(status.as_u16()));
        }

        let body: OsrmResponse = resp
            .json()
            .await
            .map_err(|e| RouteError::Decode(e.to_string()))?;

        Self::geometry_from(body)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Outcome of measuring one point against one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCheck {
    /// Distance to the nearest path vertex, or to the nearest waypoint on
    /// fallback. `None` when the route has no usable waypoints.
    pub distance_m: Option<f64>,
    pub within_tolerance: bool,
    pub fallback_used: bool,
    pub route_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_duration_s: Option<f64>,
    /// Why the routed path was not used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RouteResolver {
    service: Option<Arc<dyn RoutingService>>,
    cache: Option<Arc<dyn CacheStore>>,
    cache_ttl: Duration,
    timeout: Duration,
}

impl RouteResolver {
    pub fn new(service: Option<Arc<dyn RoutingService>>) -> Self {
        Self {
            service,
            cache: None,
            cache_ttl: DEFAULT_ROUTE_CACHE_TTL,
            timeout: MAX_ROUTING_TIMEOUT,
        }
    }

    /// Resolver that always measures against the waypoints.
    pub fn offline() -> Self {
        Self::new(None)
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Bound on one geometry lookup, cache round trips included. Never
    /// above [`MAX_ROUTING_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(MAX_ROUTING_TIMEOUT);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache_key(waypoints: &[Coordinate]) -> String {
        format!("route_geometry:{}", encode_waypoints(waypoints))
    }

    pub async fn check(&self, point: Coordinate, waypoints: &[Coordinate], tolerance_m: f64) -> RouteCheck {
        let lookup = tokio::time::timeout(self.timeout, self.geometry(waypoints))
            .await
            .unwrap_or(Err(RouteError::Timeout(self.timeout)));

        match lookup {
            Ok((geometry, cached)) => match nearest(point, &geometry.coordinates) {
                Some((_, distance)) => RouteCheck {
                    distance_m: Some(distance),
                    within_tolerance: distance <= tolerance_m,
                    fallback_used: false,
                    route_cached: cached,
                    route_distance_m: geometry.distance_m,
                    route_duration_s: geometry.duration_s,
                    error: None,
                },
                None => Self::fallback(point, waypoints, tolerance_m, RouteError::EmptyGeometry),
            },
            Err(err) => {
                warn!(
                    waypoints = waypoints.len(),
                    error = %err,
                    "Routing unavailable, measuring against waypoints"
                );
                Self::fallback(point, waypoints, tolerance_m, err)
            }
        }
    }

    fn fallback(point: Coordinate, waypoints: &[Coordinate], tolerance_m: f64, err: RouteError) -> RouteCheck {
        let distance = nearest(point, waypoints).map(|(_, d)| d);
        RouteCheck {
            distance_m: distance,
            within_tolerance: distance.is_some_and(|d| d <= tolerance_m),
            fallback_used: true,
            route_cached: false,
            route_distance_m: None,
            route_duration_s: None,
            error: Some(err.to_string()),
        }
    }

    /// Routed geometry and whether it came from the cache.
    async fn geometry(&self, waypoints: &[Coordinate]) -> Result<(RouteGeometry, bool), RouteError> {
        let Some(service) = &self.service else {
            return Err(RouteError::Http("no routing service configured".into()));
        };
        if waypoints.len() < 2 {
            return Err(RouteError::TooFewWaypoints(waypoints.len()));
        }

        let key = Self::cache_key(waypoints);
        if let Some(geometry) = self.cached(&key).await {
            debug!(key = %key, "Route geometry served from cache");
            return Ok((geometry, true));
        }

        let geometry = service.route(waypoints).await?;
        self.remember(&key, &geometry).await;
        Ok((geometry, false))
    }

    async fn cached(&self, key: &str) -> Option<RouteGeometry> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(raw)) => serde_json::from_str::<RouteGeometry>(&raw)
                .ok()
                .filter(|g| !g.coordinates.is_empty()),
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "Route cache read failed");
                None
            }
        }
    }

    async fn remember(&self, key: &str, geometry: &RouteGeometry) {
        let Some(cache) = &self.cache else {
            return;
        };
        let raw = match serde_json::to_string(geometry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Route geometry not cacheable");
                return;
            }
        };
        if let Err(err) = cache.put(key, &raw, self.cache_ttl).await {
            warn!(key = %key, error = %err, "Route cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::SystemClock;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a straight north-south path along lng 0.
    struct StraightLine {
        calls: AtomicUsize,
    }

    impl StraightLine {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RoutingService for StraightLine {
        async fn route(&self, _waypoints: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RouteGeometry {
                coordinates: (0..=10).map(|i| Coordinate::new(i as f64 * 0.001, 0.0)).collect(),
                distance_m: Some(1112.0),
                duration_s: Some(90.0),
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl RoutingService for Unreachable {
        async fn route(&self, _waypoints: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
            Err(RouteError::Http("connection refused".into()))
        }
    }

    fn ends() -> Vec<Coordinate> {
        vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.01, 0.0)]
    }

    #[tokio::test]
    async fn routed_path_is_used_when_available() {
        let resolver = RouteResolver::new(Some(Arc::new(StraightLine::new())));
        // midway along the path, ~560 m from either waypoint
        let check = resolver.check(Coordinate::new(0.005, 0.0001), &ends(), 50.0).await;
        assert!(!check.fallback_used);
        assert!(check.within_tolerance);
        assert!(check.distance_m.unwrap() < 20.0);
        assert_eq!(check.route_distance_m, Some(1112.0));
    }

    #[tokio::test]
    async fn unreachable_service_falls_back_to_waypoints() {
        let resolver = RouteResolver::new(Some(Arc::new(Unreachable)));
        let check = resolver.check(Coordinate::new(0.005, 0.0001), &ends(), 50.0).await;
        assert!(check.fallback_used);
        assert!(!check.within_tolerance);
        assert!(check.distance_m.unwrap() > 500.0);
        assert!(check.error.is_some());

        let near = resolver.check(Coordinate::new(0.0001, 0.0), &ends(), 50.0).await;
        assert!(near.fallback_used);
        assert!(near.within_tolerance);
    }

    struct Hanging;

    #[async_trait]
    impl RoutingService for Hanging {
        async fn route(&self, _: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(RouteError::EmptyGeometry)
        }
    }

    #[tokio::test]
    async fn stalled_service_times_out_into_fallback() {
        let resolver = RouteResolver::new(Some(Arc::new(Hanging))).with_timeout(Duration::from_millis(50));

        let check = tokio::time::timeout(
            Duration::from_secs(5),
            resolver.check(Coordinate::new(0.0, 0.0), &ends(), 10.0),
        )
        .await
        .expect("check must finish within its own timeout");

        assert!(check.fallback_used);
        assert!(check.within_tolerance);
        assert!(check.error.unwrap().contains("timed out"));
    }

    #[test]
    fn resolver_timeout_is_capped() {
        let resolver = RouteResolver::offline().with_timeout(Duration::from_secs(600));
        assert_eq!(resolver.timeout(), MAX_ROUTING_TIMEOUT);
    }

    #[tokio::test]
    async fn offline_and_degenerate_routes_still_answer() {
        let resolver = RouteResolver::offline();
        let check = resolver.check(Coordinate::new(0.0, 0.0), &ends(), 10.0).await;
        assert!(check.fallback_used);
        assert!(check.within_tolerance);

        let empty = resolver.check(Coordinate::new(0.0, 0.0), &[], 10.0).await;
        assert_eq!(empty.distance_m, None);
        assert!(!empty.within_tolerance);
    }

    #[tokio::test]
    async fn geometry_is_memoized() {
        let service = Arc::new(StraightLine::new());
        let cache = Arc::new(MemoryCache::new(Arc::new(SystemClock)));
        let resolver = RouteResolver::new(Some(service.clone()))
            .with_cache(cache.clone(), Duration::from_secs(60));

        let first = resolver.check(Coordinate::new(0.002, 0.0), &ends(), 50.0).await;
        let second = resolver.check(Coordinate::new(0.002, 0.0), &ends(), 50.0).await;

        assert!(!first.route_cached);
        assert!(second.route_cached);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(cache.has(&RouteResolver::cache_key(&ends())).await.unwrap());
    }

    #[test]
    fn waypoint_encoding_is_lng_first() {
        let wp = [Coordinate::new(-6.2, 106.8), Coordinate::new(-6.3, 106.9)];
        assert_eq!(encode_waypoints(&wp), "106.8,-6.2;106.9,-6.3");
        let client = OsrmClient::new("http://osrm.local/", Duration::from_secs(60)).unwrap();
        assert_eq!(
            client.route_url(&wp),
            "http://osrm.local/route/v1/driving/106.8,-6.2;106.9,-6.3?overview=full&geometries=geojson"
        );
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn osrm_client_parses_geojson_route() {
        let router = Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async {
                Json(json!({
                    "code": "Ok",
                    "routes": [{
                        "geometry": {"type": "LineString", "coordinates": [[106.8, -6.2], [106.85, -6.25], [106.9, -6.3]]},
                        "distance": 15000.5,
                        "duration": 1200.0
                    }]
                }))
            }),
        );
        let base = spawn(router).await;
        let client = OsrmClient::new(base, Duration::from_secs(2)).unwrap();

        let geometry = client
            .route(&[Coordinate::new(-6.2, 106.8), Coordinate::new(-6.3, 106.9)])
            .await
            .unwrap();
        assert_eq!(geometry.coordinates.len(), 3);
        assert_eq!(geometry.coordinates[1], Coordinate::new(-6.25, 106.85));
        assert_eq!(geometry.distance_m, Some(15000.5));
    }

    #[tokio::test]
    async fn osrm_client_reports_failures() {
        let router = Router::new()
            .route(
                "/route/v1/driving/{coords}",
                get(|| async { Json(json!({"code": "NoRoute", "message": "Impossible route", "routes": []})) }),
            );
        let base = spawn(router).await;
        let client = OsrmClient::new(base, Duration::from_secs(2)).unwrap();
        let wp = [Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)];
        assert!(matches!(client.route(&wp).await, Err(RouteError::Service(_))));

        let broken = spawn(Router::new().route(
            "/route/v1/driving/{coords}",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let client = OsrmClient::new(broken, Duration::from_secs(2)).unwrap();
        assert!(matches!(client.route(&wp).await, Err(RouteError::Status(500))));

        assert!(matches!(
            client.route(&wp[..1]).await,
            Err(RouteError::TooFewWaypoints(1))
        ));
    }

    #[tokio::test]
    async fn closed_port_degrades_to_fallback() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OsrmClient::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        let resolver = RouteResolver::new(Some(Arc::new(client)));
        let check = resolver.check(Coordinate::new(0.0, 0.0), &ends(), 10.0).await;
        assert!(check.fallback_used);
        assert!(check.within_tolerance);
    }
}
