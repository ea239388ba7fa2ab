use super::{ValidationMode, Vertex, lenient_active, lenient_bool, lenient_f64, lenient_id, lenient_list, lenient_string};
use crate::types::Coordinate;
use serde::{Deserialize, Serialize};

/// Tolerance used when a route does not set one.
pub const DEFAULT_TOLERANCE_M: f64 = 100.0;

/// Settings for `route_waypoint` attendance types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default, deserialize_with = "lenient_list")]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub validation_mode: ValidationMode,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub allow_without_location: bool,
}

/// A field route: ordered waypoints plus how far off it a punch may be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, alias = "points", deserialize_with = "lenient_list")]
    pub waypoints: Vec<Vertex>,
    #[serde(
        default,
        alias = "tolerance",
        alias = "tolerance_distance",
        alias = "tolerance_meters",
        deserialize_with = "lenient_f64"
    )]
    pub tolerance_m: Option<f64>,
    #[serde(default = "super::default_true", alias = "is_active", deserialize_with = "lenient_active")]
    pub active: bool,
}

impl RouteConfig {
    pub fn active_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.active)
    }
}

impl Route {
    /// Usable waypoints in order; unreadable ones are left out.
    pub fn points(&self) -> Vec<Coordinate> {
        self.waypoints.iter().filter_map(Vertex::coordinate).collect()
    }

    /// Negative tolerances are treated as zero.
    pub fn tolerance(&self) -> f64 {
        self.tolerance_m.unwrap_or(DEFAULT_TOLERANCE_M).max(0.0)
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}
