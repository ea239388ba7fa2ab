//! # Attendance Type Settings
//!
//! Typed views of the JSON configuration an attendance type carries. The
//! calling HR system owns these documents; this crate only reads them.
//!
//! Parsing is deliberately forgiving: a candidate entry that cannot be
//! understood is dropped (and logged) rather than failing the whole
//! document, so a malformed configuration degrades to "no active
//! candidates" instead of an error.

pub mod code;
pub mod network;
pub mod polygon;
pub mod route;

use crate::types::Coordinate;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub use code::{CodeConfig, CodeEntry};
pub use network::{NetworkConfig, NetworkLocation};
pub use polygon::{PolygonConfig, Region};
pub use route::{Route, RouteConfig};

/// The validation kinds the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    GeoPolygon,
    WifiIp,
    RouteWaypoint,
    QrCode,
}

impl AttendanceKind {
    pub const ALL: [AttendanceKind; 4] = [
        AttendanceKind::GeoPolygon,
        AttendanceKind::WifiIp,
        AttendanceKind::RouteWaypoint,
        AttendanceKind::QrCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceKind::GeoPolygon => "geo_polygon",
            AttendanceKind::WifiIp => "wifi_ip",
            AttendanceKind::RouteWaypoint => "route_waypoint",
            AttendanceKind::QrCode => "qr_code",
        }
    }

    /// Strips one trailing `_<digits>` disambiguator and lowercases:
    /// `WIFI_IP_2` becomes `wifi_ip`.
    pub fn normalize(raw: &str) -> String {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.rsplit_once('_') {
            Some((head, tail))
                if !head.is_empty() && !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) =>
            {
                head.to_string()
            }
            _ => lowered,
        }
    }
}

impl fmt::Display for AttendanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceKind {
    type Err = String;

    /// Accepts raw kind strings, suffix and case included.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = Self::normalize(raw);
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| raw.to_string())
    }
}

/// One attendance type as handed over by the HR configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceTypeConfig {
    /// Raw kind string, possibly suffixed (`wifi_ip_2`).
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub settings: Value,
}

impl AttendanceTypeConfig {
    pub fn new(kind: impl Into<String>, settings: Value) -> Self {
        Self {
            kind: kind.into(),
            settings,
        }
    }

    /// Reads the settings as `T`, falling back to `T::default()` when the
    /// document is not an object of the expected shape.
    pub fn settings_as<T: DeserializeOwned + Default>(&self) -> T {
        if self.settings.is_null() {
            return T::default();
        }
        match serde_json::from_value(self.settings.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(kind = %self.kind, error = %err, "Unreadable attendance settings; treating as empty");
                T::default()
            }
        }
    }
}

/// How per-candidate results are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// At least one active candidate must match.
    #[default]
    Any,
    /// Every active candidate must match.
    All,
}

impl ValidationMode {
    pub fn reduce<I: IntoIterator<Item = bool>>(&self, results: I) -> bool {
        let mut iter = results.into_iter().peekable();
        if iter.peek().is_none() {
            return false;
        }
        match self {
            ValidationMode::Any => iter.any(|ok| ok),
            ValidationMode::All => iter.all(|ok| ok),
        }
    }
}

impl<'de> Deserialize<'de> for ValidationMode {
    /// `"all"` in any case selects `All`; anything else is `Any`.
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v.as_str().map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "all" => ValidationMode::All,
            _ => ValidationMode::Any,
        })
    }
}

/// A polygon vertex or waypoint whose coordinates may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default, alias = "latitude", deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, alias = "longitude", alias = "lon", deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
}

impl Vertex {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat: Some(lat),
            lng: Some(lng),
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)).filter(Coordinate::is_valid),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

/// Number or numeric string; anything else is `None`.
pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(value_to_f64(&Value::deserialize(d)?))
}

/// `true`/`false`, `1`/`0`, or their string forms. Missing means `None`.
pub(crate) fn lenient_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(lenient_opt_bool(d)?.unwrap_or(false))
}

/// Candidates default to active when the flag is absent or unreadable.
pub(crate) fn lenient_active<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(lenient_opt_bool(d)?.unwrap_or(true))
}

pub(crate) fn default_true() -> bool {
    true
}

/// Ids arrive as numbers or strings; both become strings.
pub(crate) fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// A list of strings; non-string members are skipped and a lone string
/// becomes a one-element list.
pub(crate) fn lenient_strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    })
}

/// A list of `T`; members that fail to parse are dropped with a warning.
pub(crate) fn lenient_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(index = idx, error = %err, "Dropping unreadable candidate");
                None
            }
        })
        .collect())
}

/// RFC 3339 or `YYYY-MM-DD HH:MM:SS` (taken as UTC). Absent or null is
/// `None`; a present but unreadable value is an error, which drops the
/// enclosing candidate instead of silently lifting its expiry.
pub(crate) fn strict_opt_datetime<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_datetime(s.trim())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unreadable timestamp '{s}'"))),
        other => Err(D::Error::custom(format!("unreadable timestamp {other}"))),
    }
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
