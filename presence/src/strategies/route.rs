//! Route check: the punch location must be within tolerance of configured
//! routes, for staff whose work moves along a fixed path.
//!
//! Distances come from [`RouteResolver`], which falls back to the raw
//! waypoints whenever routing is unavailable. The verdict is always
//! determinate.

use super::{accepted_without, mode_label, no_active_candidates, round_m};
use crate::error::PresenceError;
use crate::route_resolver::{RouteCheck, RouteResolver};
use crate::settings::{AttendanceKind, AttendanceTypeConfig, Route, RouteConfig, ValidationMode};
use crate::traits::strategy::ValidationStrategy;
use crate::types::{Evidence, Verdict};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct RouteStrategy {
    resolver: Arc<RouteResolver>,
}

impl RouteStrategy {
    pub fn new(resolver: Arc<RouteResolver>) -> Self {
        Self { resolver }
    }

    fn audit(route: &Route, check: &RouteCheck) -> Value {
        json!({
            "id": route.id,
            "name": route.label(),
            "tolerance_m": route.tolerance(),
            "distance_m": check.distance_m.map(round_m),
            "within_tolerance": check.within_tolerance,
            "fallback_used": check.fallback_used,
            "route_cached": check.route_cached,
            "route_distance_m": check.route_distance_m,
            "route_duration_s": check.route_duration_s,
            "error": check.error,
        })
    }

    fn rejection(mode: ValidationMode, results: &[(&Route, RouteCheck)]) -> Verdict {
        let nearest = results
            .iter()
            .filter_map(|(route, check)| check.distance_m.map(|d| (*route, d)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let off_route: Vec<&str> = results
            .iter()
            .filter(|(_, c)| !c.within_tolerance)
            .map(|(r, _)| r.label())
            .collect();

        let prefix = match mode {
            ValidationMode::All if off_route.len() < results.len() => {
                format!("Location must be near every route but is off {}", off_route.join(", "))
            }
            _ => "Location is not near any allowed route".to_string(),
        };

        match nearest {
            Some((route, distance)) => Verdict::forbidden(format!(
                "{prefix}; nearest route is {} at {:.0} m (tolerance {:.0} m)",
                route.label(),
                distance,
                route.tolerance()
            ))
            .with("nearest_route_id", route.id.as_str())
            .with("distance_m", round_m(distance)),
            None => Verdict::forbidden(format!("{prefix}; no route has usable waypoints"))
                .with("nearest_route_id", Value::Null),
        }
    }
}

#[async_trait]
impl ValidationStrategy for RouteStrategy {
    fn kind(&self) -> AttendanceKind {
        AttendanceKind::RouteWaypoint
    }

    async fn validate(
        &self,
        config: &AttendanceTypeConfig,
        evidence: &Evidence,
    ) -> Result<Verdict, PresenceError> {
        let settings: RouteConfig = config.settings_as();
        let active: Vec<&Route> = settings.active_routes().collect();

        if active.is_empty() {
            return Ok(if settings.allow_without_location {
                accepted_without("route")
            } else {
                no_active_candidates("routes", settings.routes.len())
            });
        }

        let Some(point) = evidence.location else {
            return Ok(if settings.allow_without_location {
                accepted_without("route")
            } else {
                Verdict::missing_evidence("Location is required for this attendance type")
            });
        };

        let checks = join_all(active.iter().map(|route| {
            let waypoints = route.points();
            let tolerance = route.tolerance();
            let resolver = &self.resolver;
            async move { resolver.check(point, &waypoints, tolerance).await }
        }))
        .await;

        let results: Vec<(&Route, RouteCheck)> = active.into_iter().zip(checks).collect();
        let passed = settings
            .validation_mode
            .reduce(results.iter().map(|(_, c)| c.within_tolerance));
        let fallback_used = results.iter().any(|(_, c)| c.fallback_used);
        let route_cached = results.iter().any(|(_, c)| c.route_cached);
        let audit: Vec<Value> = results.iter().map(|(r, c)| Self::audit(r, c)).collect();

        let verdict = if passed {
            let (route, check) = results
                .iter()
                .filter(|(_, c)| c.within_tolerance)
                .min_by(|a, b| {
                    let da = a.1.distance_m.unwrap_or(f64::INFINITY);
                    let db = b.1.distance_m.unwrap_or(f64::INFINITY);
                    da.total_cmp(&db)
                })
                .map(|(r, c)| (*r, c))
                .unzip();
            let distance = check.and_then(|c| c.distance_m).unwrap_or_default();
            Verdict::ok(format!(
                "Location is on route {} ({:.0} m away)",
                route.map(Route::label).unwrap_or_default(),
                distance
            ))
            .with("matched_route_id", route.map(|r| r.id.as_str()).unwrap_or_default())
            .with("distance_m", round_m(distance))
        } else {
            Self::rejection(settings.validation_mode, &results)
        };

        Ok(verdict
            .with("fallback_used", fallback_used)
            .with("route_cached", route_cached)
            .with("validation_mode", mode_label(settings.validation_mode))
            .with("checks", audit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::routing::{RouteError, RouteGeometry, RoutingService};
    use crate::types::{Coordinate, FailureKind};

    struct Down;

    #[async_trait]
    impl RoutingService for Down {
        async fn route(&self, _: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
            Err(RouteError::Status(503))
        }
    }

    /// Echoes a densified straight line between the first and last waypoint.
    struct Densify;

    #[async_trait]
    impl RoutingService for Densify {
        async fn route(&self, wp: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
            let (a, b) = (wp[0], wp[wp.len() - 1]);
            let coordinates = (0..=100)
                .map(|i| {
                    let t = i as f64 / 100.0;
                    Coordinate::new(a.lat + (b.lat - a.lat) * t, a.lng + (b.lng - a.lng) * t)
                })
                .collect();
            Ok(RouteGeometry {
                coordinates,
                distance_m: None,
                duration_s: None,
            })
        }
    }

    fn config(mode: &str) -> AttendanceTypeConfig {
        AttendanceTypeConfig::new(
            "route_waypoint_3",
            json!({
                "validation_mode": mode,
                "routes": [
                    {"id": 1, "name": "East", "tolerance": 100,
                     "waypoints": [{"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 0.1}]},
                    {"id": 2, "name": "North", "tolerance": 100,
                     "waypoints": [{"lat": 0.0, "lng": 0.0}, {"lat": 0.1, "lng": 0.0}]}
                ]
            }),
        )
    }

    fn strategy(service: Option<Arc<dyn RoutingService>>) -> RouteStrategy {
        RouteStrategy::new(Arc::new(RouteResolver::new(service)))
    }

    #[tokio::test]
    async fn routed_path_accepts_midway_point() {
        let s = strategy(Some(Arc::new(Densify)));
        let v = s
            .validate(&config("any"), &Evidence::new().with_location(0.0003, 0.05))
            .await
            .unwrap();
        assert!(v.success, "{}", v.message);
        assert_eq!(v.meta("matched_route_id"), Some(&json!("1")));
        assert_eq!(v.meta("fallback_used"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn unreachable_routing_uses_waypoints() {
        let s = strategy(Some(Arc::new(Down)));

        // midway along East: far from every waypoint
        let v = s
            .validate(&config("any"), &Evidence::new().with_location(0.0003, 0.05))
            .await
            .unwrap();
        assert!(!v.success);
        assert_eq!(v.meta("fallback_used"), Some(&json!(true)));
        assert_eq!(v.status, 403);

        // near the shared start waypoint
        let v = s
            .validate(&config("any"), &Evidence::new().with_location(0.0001, 0.0001))
            .await
            .unwrap();
        assert!(v.success);
        assert_eq!(v.meta("fallback_used"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn failure_names_nearest_route() {
        let s = strategy(None);
        let v = s
            .validate(&config("any"), &Evidence::new().with_location(0.1, 0.005))
            .await
            .unwrap();
        assert!(!v.success);
        assert!(v.message.contains("nearest route is North"), "{}", v.message);
        assert_eq!(v.meta("nearest_route_id"), Some(&json!("2")));
    }

    #[tokio::test]
    async fn all_mode_needs_every_route() {
        let s = strategy(Some(Arc::new(Densify)));
        let start = Evidence::new().with_location(0.0, 0.0);
        assert!(s.validate(&config("all"), &start).await.unwrap().success);

        let east_only = Evidence::new().with_location(0.0, 0.05);
        let v = s.validate(&config("all"), &east_only).await.unwrap();
        assert!(!v.success);
        assert!(v.message.contains("off North"), "{}", v.message);
    }

    #[tokio::test]
    async fn missing_location_and_escape_flag() {
        let s = strategy(None);
        let v = s.validate(&config("any"), &Evidence::new()).await.unwrap();
        assert_eq!(v.failure, Some(FailureKind::EvidenceMissing));

        let mut lenient = config("any");
        lenient.settings["allow_without_location"] = json!(true);
        let v = s.validate(&lenient, &Evidence::new()).await.unwrap();
        assert!(v.success);
        assert_eq!(v.meta("validated"), Some(&json!(false)));
    }
}
