//! Geofence check: the punch location must lie inside configured regions.
//!
//! Membership is binary; there is no distance tolerance. Distances to
//! region centroids are computed only to name the nearest region when the
//! check fails.

use super::{accepted_without, mode_label, no_active_candidates, round_m};
use crate::error::PresenceError;
use crate::geo::{centroid, haversine_distance_m, point_in_polygon};
use crate::settings::{AttendanceKind, AttendanceTypeConfig, PolygonConfig, ValidationMode};
use crate::traits::strategy::ValidationStrategy;
use crate::types::{Evidence, Verdict};
use async_trait::async_trait;
use serde_json::{Value, json};

#[derive(Debug, Default, Clone, Copy)]
pub struct PolygonStrategy;

struct RegionCheck<'a> {
    id: &'a str,
    label: &'a str,
    inside: bool,
    centroid_distance_m: Option<f64>,
}

impl RegionCheck<'_> {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.label,
            "inside": self.inside,
            "centroid_distance_m": self.centroid_distance_m.map(round_m),
        })
    }
}

#[async_trait]
impl ValidationStrategy for PolygonStrategy {
    fn kind(&self) -> AttendanceKind {
        AttendanceKind::GeoPolygon
    }

    async fn validate(
        &self,
        config: &AttendanceTypeConfig,
        evidence: &Evidence,
    ) -> Result<Verdict, PresenceError> {
        let settings: PolygonConfig = config.settings_as();
        let active: Vec<_> = settings.active_regions().collect();

        if active.is_empty() {
            return Ok(if settings.allow_without_location {
                accepted_without("location")
            } else {
                no_active_candidates("regions", settings.regions.len())
            });
        }

        let Some(point) = evidence.location else {
            return Ok(if settings.allow_without_location {
                accepted_without("location")
            } else {
                Verdict::missing_evidence("Location is required for this attendance type")
            });
        };

        let checks: Vec<RegionCheck> = active
            .iter()
            .map(|region| {
                let ring = region.ring();
                RegionCheck {
                    id: &region.id,
                    label: region.label(),
                    inside: point_in_polygon(point, &ring),
                    centroid_distance_m: centroid(&ring).map(|c| haversine_distance_m(point, c)),
                }
            })
            .collect();

        let passed = settings.validation_mode.reduce(checks.iter().map(|c| c.inside));
        let audit: Vec<Value> = checks.iter().map(RegionCheck::to_json).collect();
        let matched: Vec<&str> = checks.iter().filter(|c| c.inside).map(|c| c.id).collect();

        let verdict = if passed {
            let first = checks.iter().find(|c| c.inside);
            let label = first.map(|c| c.label).unwrap_or_default();
            Verdict::ok(format!("Location is inside {label}"))
                .with("matched_region_id", first.map(|c| c.id).unwrap_or_default())
                .with("matched_region_ids", matched)
        } else {
            Self::rejection(settings.validation_mode, &checks).with("matched_region_ids", matched)
        };

        Ok(verdict
            .with("validation_mode", mode_label(settings.validation_mode))
            .with("checks", audit))
    }
}

impl PolygonStrategy {
    fn rejection(mode: ValidationMode, checks: &[RegionCheck]) -> Verdict {
        let outside: Vec<&RegionCheck> = checks.iter().filter(|c| !c.inside).collect();
        let nearest = outside
            .iter()
            .filter_map(|c| c.centroid_distance_m.map(|d| (c, d)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let mut message = match mode {
            ValidationMode::All if outside.len() < checks.len() => format!(
                "Location must be inside all {} regions but is outside {}",
                checks.len(),
                outside.iter().map(|c| c.label).collect::<Vec<_>>().join(", ")
            ),
            _ => "Location is outside the allowed area".to_string(),
        };

        match nearest {
            Some((region, distance)) => {
                message.push_str(&format!(
                    "; nearest region is {} ({:.0} m away)",
                    region.label, distance
                ));
                Verdict::forbidden(message)
                    .with("nearest_region_id", region.id)
                    .with("distance_m", round_m(distance))
            }
            None => Verdict::forbidden(message).with("nearest_region_id", Value::Null),
        }
    }
}
