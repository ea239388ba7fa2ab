//! Network check: the client IP must belong to configured locations.
//!
//! The address is taken from `X-Forwarded-For` (first hop), then
//! `X-Real-IP`, then the TCP peer; see [`Evidence::effective_ip`].

use super::{accepted_without, mode_label, no_active_candidates};
use crate::error::PresenceError;
use crate::settings::network::NetworkMatch;
use crate::settings::{AttendanceKind, AttendanceTypeConfig, NetworkConfig, ValidationMode};
use crate::traits::strategy::ValidationStrategy;
use crate::types::{Evidence, Verdict};
use async_trait::async_trait;
use serde_json::{Value, json};

#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkStrategy;

#[async_trait]
impl ValidationStrategy for NetworkStrategy {
    fn kind(&self) -> AttendanceKind {
        AttendanceKind::WifiIp
    }

    async fn validate(
        &self,
        config: &AttendanceTypeConfig,
        evidence: &Evidence,
    ) -> Result<Verdict, PresenceError> {
        let settings: NetworkConfig = config.settings_as();
        let active: Vec<_> = settings.active_locations().collect();

        if active.is_empty() {
            return Ok(if settings.allow_without_network {
                accepted_without("network")
            } else {
                no_active_candidates("network locations", settings.locations.len())
            });
        }

        let Some((ip, source)) = evidence.effective_ip() else {
            return Ok(if settings.allow_without_network {
                accepted_without("network")
            } else {
                Verdict::missing_evidence("Client IP address could not be determined")
            });
        };

        let results: Vec<Option<NetworkMatch>> = active.iter().map(|loc| loc.matches(&ip)).collect();
        let audit: Vec<Value> = active
            .iter()
            .zip(&results)
            .map(|(loc, hit)| {
                let (matched_by, rule) = match hit {
                    Some(NetworkMatch::Exact(rule)) => (Some("ip_address"), Some(rule.as_str())),
                    Some(NetworkMatch::Range(rule)) => (Some("ip_range"), Some(rule.as_str())),
                    None => (None, None),
                };
                json!({
                    "id": loc.id,
                    "name": loc.label(),
                    "matched": hit.is_some(),
                    "matched_by": matched_by,
                    "rule": rule,
                })
            })
            .collect();

        let passed = settings.validation_mode.reduce(results.iter().map(Option::is_some));
        let matched: Vec<&str> = active
            .iter()
            .zip(&results)
            .filter(|(_, hit)| hit.is_some())
            .map(|(loc, _)| loc.id.as_str())
            .collect();

        let verdict = if passed {
            let first = active.iter().zip(&results).find(|(_, hit)| hit.is_some()).map(|(loc, _)| loc);
            Verdict::ok(format!(
                "Connected from {} network",
                first.map(|l| l.label()).unwrap_or_default()
            ))
            .with("matched_location_id", first.map(|l| l.id.as_str()).unwrap_or_default())
        } else {
            let missing: Vec<&str> = active
                .iter()
                .zip(&results)
                .filter(|(_, hit)| hit.is_none())
                .map(|(loc, _)| loc.label())
                .collect();
            let message = match settings.validation_mode {
                ValidationMode::All if missing.len() < active.len() => format!(
                    "IP address {ip} is not on every required network; missing {}",
                    missing.join(", ")
                ),
                _ => format!("IP address {ip} is not on an allowed network"),
            };
            Verdict::forbidden(message)
        };

        Ok(verdict
            .with("client_ip", ip.as_str())
            .with("ip_source", json!(source))
            .with("matched_location_ids", matched)
            .with("validation_mode", mode_label(settings.validation_mode))
            .with("checks", audit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    fn two_offices(mode: &str) -> AttendanceTypeConfig {
        AttendanceTypeConfig::new(
            "wifi_ip",
            json!({
                "validation_mode": mode,
                "locations": [
                    {"id": 1, "name": "Floor 1", "ip_addresses": ["10.0.0.5"], "ip_ranges": ["192.168.1.0/24"]},
                    {"id": 2, "name": "Floor 2", "ip_ranges": ["192.168.0.0/16"]}
                ]
            }),
        )
    }

    #[tokio::test]
    async fn any_mode_needs_one_location() {
        let cfg = two_offices("any");

        let v = NetworkStrategy
            .validate(&cfg, &Evidence::new().with_remote_addr("192.168.7.7"))
            .await
            .unwrap();
        assert!(v.success);
        assert_eq!(v.meta("matched_location_id"), Some(&json!("2")));

        let v = NetworkStrategy
            .validate(&cfg, &Evidence::new().with_remote_addr("10.0.0.5"))
            .await
            .unwrap();
        assert!(v.success);

        let v = NetworkStrategy
            .validate(&cfg, &Evidence::new().with_remote_addr("172.16.0.1"))
            .await
            .unwrap();
        assert!(!v.success);
        assert_eq!(v.status, 403);
    }

    #[tokio::test]
    async fn all_mode_needs_every_location() {
        let cfg = two_offices("all");

        let both = NetworkStrategy
            .validate(&cfg, &Evidence::new().with_remote_addr("192.168.1.20"))
            .await
            .unwrap();
        assert!(both.success);

        let one = NetworkStrategy
            .validate(&cfg, &Evidence::new().with_remote_addr("192.168.9.20"))
            .await
            .unwrap();
        assert!(!one.success);
        assert!(one.message.contains("missing Floor 1"), "{}", one.message);
    }

    #[tokio::test]
    async fn forwarded_header_takes_precedence() {
        let cfg = two_offices("any");
        let ev = Evidence::new()
            .with_remote_addr("10.0.0.5")
            .with_forwarded_for("203.0.113.9, 10.0.0.5");

        let v = NetworkStrategy.validate(&cfg, &ev).await.unwrap();
        assert!(!v.success);
        assert_eq!(v.meta("client_ip"), Some(&json!("203.0.113.9")));
        assert_eq!(v.meta("ip_source"), Some(&json!("x_forwarded_for")));
    }

    #[tokio::test]
    async fn missing_ip_and_escape_flag() {
        let cfg = two_offices("any");
        let v = NetworkStrategy.validate(&cfg, &Evidence::new()).await.unwrap();
        assert_eq!(v.failure, Some(FailureKind::EvidenceMissing));

        let lenient = AttendanceTypeConfig::new("wifi_ip", json!({"allow_without_network": true}));
        let v = NetworkStrategy.validate(&lenient, &Evidence::new()).await.unwrap();
        assert!(v.success);
        assert_eq!(v.meta("validated"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn all_locations_inactive_is_a_configuration_error() {
        let cfg = AttendanceTypeConfig::new(
            "wifi_ip",
            json!({"locations": [{"id": 1, "ip_addresses": ["10.0.0.5"], "is_active": 0}]}),
        );
        let v = NetworkStrategy
            .validate(&cfg, &Evidence::new().with_remote_addr("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(v.status, 422);
        assert_eq!(v.failure, Some(FailureKind::Configuration));
    }
}
