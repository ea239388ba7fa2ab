use super::{ValidationMode, lenient_active, lenient_bool, lenient_id, lenient_list, lenient_string, lenient_strings};
use crate::geo::cidr_contains;
use serde::{Deserialize, Serialize};

/// Settings for `wifi_ip` attendance types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, alias = "networks", deserialize_with = "lenient_list")]
    pub locations: Vec<NetworkLocation>,
    #[serde(default)]
    pub validation_mode: ValidationMode,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub allow_without_network: bool,
}

/// One site and the addresses its network egresses from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLocation {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, alias = "ips", alias = "allowed_ips", deserialize_with = "lenient_strings")]
    pub ip_addresses: Vec<String>,
    #[serde(default, alias = "cidr_ranges", alias = "ranges", deserialize_with = "lenient_strings")]
    pub ip_ranges: Vec<String>,
    #[serde(default = "super::default_true", alias = "is_active", deserialize_with = "lenient_active")]
    pub active: bool,
}

/// How a client address matched a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMatch {
    Exact(String),
    Range(String),
}

impl NetworkConfig {
    pub fn active_locations(&self) -> impl Iterator<Item = &NetworkLocation> {
        self.locations.iter().filter(|l| l.active)
    }
}

impl NetworkLocation {
    /// Exact addresses are tried before ranges.
    pub fn matches(&self, ip: &str) -> Option<NetworkMatch> {
        if let Some(exact) = self.ip_addresses.iter().find(|a| cidr_contains(ip, a)) {
            return Some(NetworkMatch::Exact(exact.clone()));
        }
        self.ip_ranges
            .iter()
            .find(|r| cidr_contains(ip, r))
            .map(|r| NetworkMatch::Range(r.clone()))
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}
