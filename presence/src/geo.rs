//! Geometry and address arithmetic used by the strategies.
//!
//! Everything here is pure and infallible: malformed input yields `false`
//! (or is skipped), never a panic.

use crate::types::Coordinate;
use ipnet::IpNet;
use std::net::IpAddr;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Even-odd ray casting over an implicitly closed ring.
///
/// A `None` vertex (missing or non-finite coordinates) removes both edges
/// touching it instead of failing the whole test. Winding order does not
/// matter. Fewer than three usable vertices never contain anything.
pub fn point_in_polygon(point: Coordinate, vertices: &[Option<Coordinate>]) -> bool {
    let usable = vertices.iter().flatten().count();
    if usable < 3 || !point.lat.is_finite() || !point.lng.is_finite() {
        return false;
    }

    let n = vertices.len();
    let (x, y) = (point.lng, point.lat);
    let mut inside = false;

    for i in 0..n {
        let j = if i == 0 { n - 1 } else { i - 1 };
        let (Some(a), Some(b)) = (vertices[i], vertices[j]) else {
            continue;
        };
        let (xi, yi, xj, yj) = (a.lng, a.lat, b.lng, b.lat);
        // (yi > y) != (yj > y) guarantees yi != yj below.
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }

    inside
}

/// Great-circle distance in meters.
pub fn haversine_distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = ((dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2))
        .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Smallest distance from `point` to any of `targets`, with the index of
/// the closest one. `None` when `targets` is empty.
pub fn nearest(point: Coordinate, targets: &[Coordinate]) -> Option<(usize, f64)> {
    targets
        .iter()
        .map(|t| haversine_distance_m(point, *t))
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Arithmetic mean of the usable vertices. Good enough to rank regions by
/// proximity in failure messages.
pub fn centroid(vertices: &[Option<Coordinate>]) -> Option<Coordinate> {
    let usable: Vec<Coordinate> = vertices.iter().flatten().copied().collect();
    if usable.is_empty() {
        return None;
    }
    let n = usable.len() as f64;
    let lat = usable.iter().map(|c| c.lat).sum::<f64>() / n;
    let lng = usable.iter().map(|c| c.lng).sum::<f64>() / n;
    Some(Coordinate::new(lat, lng))
}

/// Whether `ip` falls inside `cidr` (`subnet/bits`).
///
/// Without a `/`, `cidr` is compared as an exact address. IPv4-mapped IPv6
/// addresses are unwrapped before comparing. Any parse failure, including
/// out-of-range prefix bits, is `false`.
pub fn cidr_contains(ip: &str, cidr: &str) -> bool {
    let Ok(addr) = ip.trim().parse::<IpAddr>() else {
        return false;
    };
    let addr = addr.to_canonical();
    let cidr = cidr.trim();

    if !cidr.contains('/') {
        return cidr
            .parse::<IpAddr>()
            .map(|exact| exact.to_canonical() == addr)
            .unwrap_or(false);
    }

    cidr.parse::<IpNet>()
        .map(|net| net.contains(&addr))
        .unwrap_or(false)
}
