use crate::types::Coordinate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A routed path as returned by a routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    /// Path vertices in travel order.
    pub coordinates: Vec<Coordinate>,
    /// Length of the routed path in meters, when reported.
    pub distance_m: Option<f64>,
    /// Travel time in seconds, when reported.
    pub duration_s: Option<f64>,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("at least two waypoints are required, got {0}")]
    TooFewWaypoints(usize),
    #[error("routing request failed: {0}")]
    Http(String),
    #[error("routing service answered HTTP {0}")]
    Status(u16),
    #[error("routing service reported '{0}'")]
    Service(String),
    #[error("routing response could not be decoded: {0}")]
    Decode(String),
    #[error("routing response has no geometry")]
    EmptyGeometry,
    #[error("routing timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Source of routed path geometry for an ordered set of waypoints.
#[async_trait]
pub trait RoutingService: Send + Sync {
    async fn route(&self, waypoints: &[Coordinate]) -> Result<RouteGeometry, RouteError>;
}
