use super::{ValidationMode, Vertex, lenient_active, lenient_bool, lenient_id, lenient_list, lenient_string};
use crate::types::Coordinate;
use serde::{Deserialize, Serialize};

/// Settings for `geo_polygon` attendance types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonConfig {
    #[serde(default, alias = "polygons", deserialize_with = "lenient_list")]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub validation_mode: ValidationMode,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub allow_without_location: bool,
}

/// One geofenced area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Ordered ring; the last vertex joins the first.
    #[serde(default, alias = "coordinates", alias = "points", deserialize_with = "lenient_list")]
    pub vertices: Vec<Vertex>,
    #[serde(default = "super::default_true", alias = "is_active", deserialize_with = "lenient_active")]
    pub active: bool,
}

impl PolygonConfig {
    pub fn active_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.active)
    }
}

impl Region {
    /// Vertices in order, `None` where coordinates are unusable.
    pub fn ring(&self) -> Vec<Option<Coordinate>> {
        self.vertices.iter().map(Vertex::coordinate).collect()
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}
