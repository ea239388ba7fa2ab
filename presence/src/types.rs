//! # Types Module
//!
//! Core data structures shared by every strategy: the submitted [`Evidence`]
//! and the resulting [`Verdict`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_OK: u16 = 200;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// A WGS-84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the lat/lng value ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Where the effective client IP was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IpSource {
    XForwardedFor,
    XRealIp,
    RemoteAddr,
}

/// Runtime data submitted with a single punch event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub location: Option<Coordinate>,
    pub qr_code: Option<String>,
    /// Address of the TCP peer.
    pub remote_addr: Option<String>,
    /// Raw `X-Forwarded-For` header value.
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` header value.
    pub real_ip: Option<String>,
    /// Who is punching; recorded when a one-time code is consumed.
    pub subject: Option<String>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches coordinates. Non-finite or out-of-range values are dropped,
    /// so the evidence reads as "no location".
    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        let point = Coordinate::new(lat, lng);
        self.location = point.is_valid().then_some(point);
        self
    }

    pub fn with_qr_code(mut self, code: impl Into<String>) -> Self {
        self.qr_code = Some(code.into());
        self
    }

    pub fn with_remote_addr(mut self, ip: impl Into<String>) -> Self {
        self.remote_addr = Some(ip.into());
        self
    }

    pub fn with_forwarded_for(mut self, header: impl Into<String>) -> Self {
        self.forwarded_for = Some(header.into());
        self
    }

    pub fn with_real_ip(mut self, header: impl Into<String>) -> Self {
        self.real_ip = Some(header.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// The scanned code with surrounding whitespace removed, if non-empty.
    pub fn scanned_code(&self) -> Option<&str> {
        self.qr_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// The client IP to authorize: first `X-Forwarded-For` hop, then
    /// `X-Real-IP`, then the peer address.
    pub fn effective_ip(&self) -> Option<(String, IpSource)> {
        let first_hop = self
            .forwarded_for
            .as_deref()
            .and_then(|h| h.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = first_hop {
            return Some((ip.to_string(), IpSource::XForwardedFor));
        }

        let pick = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        };
        if let Some(ip) = pick(&self.real_ip) {
            return Some((ip, IpSource::XRealIp));
        }
        pick(&self.remote_addr).map(|ip| (ip, IpSource::RemoteAddr))
    }
}

/// Why a verdict failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The attendance type itself is unusable (unknown kind, nothing configured).
    Configuration,
    /// Required coordinates, IP or code were not submitted.
    EvidenceMissing,
    /// Evidence was present but did not satisfy the rules.
    Authorization,
    /// A single-use code was already consumed.
    Replay,
}

/// The engine's decision for one punch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub success: bool,
    pub message: String,
    /// HTTP-style status: 200, 403 or 422.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Audit detail: matched candidate ids, distances, per-candidate checks.
    pub metadata: Map<String, Value>,
}

impl Verdict {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            status: STATUS_OK,
            failure: None,
            metadata: Map::new(),
        }
    }

    /// Success without the evidence having been checked, allowed by an
    /// "allow without" escape flag.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::ok(message).with("validated", false)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::failed(message, STATUS_FORBIDDEN, FailureKind::Authorization)
    }

    pub fn replayed(message: impl Into<String>) -> Self {
        Self::failed(message, STATUS_FORBIDDEN, FailureKind::Replay)
    }

    pub fn missing_evidence(message: impl Into<String>) -> Self {
        Self::failed(message, STATUS_UNPROCESSABLE, FailureKind::EvidenceMissing)
    }

    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::failed(message, STATUS_UNPROCESSABLE, FailureKind::Configuration)
    }

    fn failed(message: impl Into<String>, status: u16, failure: FailureKind) -> Self {
        Self {
            success: false,
            message: message.into(),
            status,
            failure: Some(failure),
            metadata: Map::new(),
        }
    }

    /// Adds one metadata entry.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}
