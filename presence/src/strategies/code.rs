//! Scanned-code check.
//!
//! A punch carries the text of a printed QR code. The code must match a
//! configured entry that is active and unexpired. Single-use codes are
//! consumed through the [`ReplayGuard`], and codes posted at a location
//! also require the punch to happen near it.

use super::{no_active_candidates, round_m};
use crate::clock::Clock;
use crate::error::PresenceError;
use crate::geo::haversine_distance_m;
use crate::replay_guard::ReplayGuard;
use crate::settings::code::{CodeEntry, CodeLookup, Expiry};
use crate::settings::{AttendanceKind, AttendanceTypeConfig, CodeConfig};
use crate::traits::strategy::ValidationStrategy;
use crate::types::{Evidence, Verdict};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct CodeStrategy {
    clock: Arc<dyn Clock>,
    replay: Arc<ReplayGuard>,
}

impl CodeStrategy {
    pub fn new(clock: Arc<dyn Clock>, replay: Arc<ReplayGuard>) -> Self {
        Self { clock, replay }
    }
}

#[async_trait]
impl ValidationStrategy for CodeStrategy {
    fn kind(&self) -> AttendanceKind {
        AttendanceKind::QrCode
    }

    async fn validate(
        &self,
        config: &AttendanceTypeConfig,
        evidence: &Evidence,
    ) -> Result<Verdict, PresenceError> {
        let settings: CodeConfig = config.settings_as();

        if settings.active_codes().next().is_none() {
            return Ok(no_active_candidates("QR codes", settings.codes.len()));
        }

        let Some(scanned) = evidence.scanned_code() else {
            return Ok(Verdict::missing_evidence("A scanned QR code is required"));
        };

        let now = self.clock.now();
        let entry = match settings.lookup(scanned, now) {
            CodeLookup::Usable(entry) => entry,
            CodeLookup::Unknown => {
                return Ok(Verdict::forbidden("QR code is not recognised for this attendance type"));
            }
            CodeLookup::Inactive(entry) => {
                let code_id = entry.token_id();
                return Ok(tagged(
                    &settings,
                    entry,
                    Verdict::forbidden(format!("QR code {code_id} is inactive")),
                ));
            }
            CodeLookup::Expired(entry, Expiry::Absolute(at)) => {
                let code_id = entry.token_id();
                return Ok(tagged(
                    &settings,
                    entry,
                    Verdict::forbidden(format!("QR code {code_id} expired at {}", at.to_rfc3339())),
                ));
            }
            CodeLookup::Expired(entry, Expiry::Rolling(at)) => {
                let code_id = entry.token_id();
                return Ok(tagged(
                    &settings,
                    entry,
                    Verdict::forbidden(format!(
                        "QR code {code_id} is older than {} hours (expired at {})",
                        settings.code_expiry_hours.unwrap_or_default(),
                        at.to_rfc3339()
                    )),
                ));
            }
        };

        let code_id = entry.token_id().to_string();
        let one_time = settings.is_one_time(entry);
        let tag = |v: Verdict| tagged(&settings, entry, v);

        if one_time && self.replay.is_used(&code_id).await? {
            return Ok(tag(Verdict::replayed(format!(
                "QR code {code_id} has already been used"
            ))));
        }

        let mut distance_m = None;
        if settings.requires_location(entry) {
            let Some(target) = entry.location.and_then(|v| v.coordinate()) else {
                return Ok(tag(Verdict::misconfigured(format!(
                    "QR code {code_id} requires a location but none is configured for it"
                ))));
            };
            let Some(point) = evidence.location else {
                return Ok(tag(Verdict::missing_evidence(
                    "Location is required to use this QR code",
                )));
            };

            let max = settings.max_distance_for(entry);
            let distance = haversine_distance_m(point, target);
            if distance > max {
                return Ok(tag(Verdict::forbidden(format!(
                    "You are {distance:.0} m from QR code {code_id}; at most {max:.0} m is allowed"
                )))
                .with("distance_m", round_m(distance))
                .with("max_distance_m", max));
            }
            distance_m = Some(round_m(distance));
        }

        if one_time && !self.replay.try_consume(&code_id, evidence.subject.as_deref()).await? {
            return Ok(tag(Verdict::replayed(format!(
                "QR code {code_id} has already been used"
            ))));
        }

        if one_time {
            info!(code = %code_id, subject = ?evidence.subject, "Single-use QR code consumed");
        }

        let mut verdict = tag(Verdict::ok(format!("QR code {code_id} accepted")));
        if let Some(d) = distance_m {
            verdict = verdict.with("distance_m", d);
        }
        Ok(verdict)
    }
}

fn tagged(settings: &CodeConfig, entry: &CodeEntry, verdict: Verdict) -> Verdict {
    verdict
        .with("code_id", entry.token_id())
        .with("one_time_use", settings.is_one_time(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::FixedClock;
    use crate::types::FailureKind;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{Value, json};

    fn setup() -> (Arc<FixedClock>, CodeStrategy) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        ));
        let cache = Arc::new(MemoryCache::new(clock.clone()));
        let replay = Arc::new(ReplayGuard::new(cache, clock.clone()));
        (clock.clone(), CodeStrategy::new(clock, replay))
    }

    fn config(settings: Value) -> AttendanceTypeConfig {
        AttendanceTypeConfig::new("qr_code", settings)
    }

    #[tokio::test]
    async fn one_time_code_works_once() {
        let (_, s) = setup();
        let cfg = config(json!({"codes": [{"id": 11, "code": "GATE-A", "one_time_use": true}]}));
        let ev = Evidence::new().with_qr_code(" GATE-A ").with_subject("emp-7");

        let first = s.validate(&cfg, &ev).await.unwrap();
        assert!(first.success, "{}", first.message);
        assert_eq!(first.meta("code_id"), Some(&json!("11")));
        assert_eq!(first.meta("one_time_use"), Some(&json!(true)));

        let second = s.validate(&cfg, &ev).await.unwrap();
        assert!(!second.success);
        assert_eq!(second.status, 403);
        assert_eq!(second.failure, Some(FailureKind::Replay));
    }

    #[tokio::test]
    async fn global_one_time_flag_applies() {
        let (_, s) = setup();
        let cfg = config(json!({"one_time_use": true, "codes": [{"id": 1, "code": "X"}]}));
        let ev = Evidence::new().with_qr_code("X");
        assert!(s.validate(&cfg, &ev).await.unwrap().success);
        assert!(!s.validate(&cfg, &ev).await.unwrap().success);
    }

    #[tokio::test]
    async fn reusable_code_can_be_scanned_repeatedly() {
        let (_, s) = setup();
        let cfg = config(json!({"codes": [{"id": 1, "code": "LOBBY"}]}));
        let ev = Evidence::new().with_qr_code("LOBBY");
        for _ in 0..3 {
            assert!(s.validate(&cfg, &ev).await.unwrap().success);
        }
    }

    #[tokio::test]
    async fn expired_code_always_fails() {
        let (_, s) = setup();
        let cfg = config(json!({"codes": [{
            "id": 5, "code": "OLD", "expires_at": "2026-03-01T00:00:00Z",
            "one_time_use": false, "location": {"lat": 0, "lng": 0}, "max_distance": 1000000
        }]}));
        let ev = Evidence::new().with_qr_code("OLD").with_location(0.0, 0.0);
        let v = s.validate(&cfg, &ev).await.unwrap();
        assert!(!v.success);
        assert!(v.message.contains("expired"), "{}", v.message);
    }

    #[tokio::test]
    async fn rolling_expiry_follows_the_clock() {
        let (clock, s) = setup();
        let cfg = config(json!({
            "code_expiry_hours": 1,
            "codes": [{"id": 1, "code": "SHIFT", "created_at": "2026-03-02T07:30:00Z"}]
        }));
        let ev = Evidence::new().with_qr_code("SHIFT");
        assert!(s.validate(&cfg, &ev).await.unwrap().success);

        clock.advance(Duration::minutes(31));
        let v = s.validate(&cfg, &ev).await.unwrap();
        assert!(!v.success);
        assert!(v.message.contains("older than 1 hours"), "{}", v.message);
    }

    #[tokio::test]
    async fn location_bound_code() {
        let (_, s) = setup();
        let cfg = config(json!({"codes": [{
            "id": 3, "code": "DOCK", "location": {"lat": -6.2, "lng": 106.8}, "max_distance": 50
        }]}));

        let near = Evidence::new().with_qr_code("DOCK").with_location(-6.2002, 106.8);
        let v = s.validate(&cfg, &near).await.unwrap();
        assert!(v.success, "{}", v.message);
        assert!(v.meta("distance_m").is_some());

        let far = Evidence::new().with_qr_code("DOCK").with_location(-6.21, 106.8);
        let v = s.validate(&cfg, &far).await.unwrap();
        assert!(!v.success);
        assert!(v.message.contains("from QR code 3"), "{}", v.message);

        let none = Evidence::new().with_qr_code("DOCK");
        let v = s.validate(&cfg, &none).await.unwrap();
        assert_eq!(v.failure, Some(FailureKind::EvidenceMissing));
    }

    #[tokio::test]
    async fn rejected_location_does_not_consume_the_code() {
        let (_, s) = setup();
        let cfg = config(json!({"codes": [{
            "id": 4, "code": "ONCE", "one_time_use": true,
            "location": {"lat": 0, "lng": 0}, "max_distance": 10
        }]}));

        let far = Evidence::new().with_qr_code("ONCE").with_location(1.0, 1.0);
        assert!(!s.validate(&cfg, &far).await.unwrap().success);

        let near = Evidence::new().with_qr_code("ONCE").with_location(0.0, 0.0);
        assert!(s.validate(&cfg, &near).await.unwrap().success);
    }

    #[tokio::test]
    async fn global_location_flag_without_code_location_is_misconfigured() {
        let (_, s) = setup();
        let cfg = config(json!({"require_location": true, "codes": [{"id": 1, "code": "A"}]}));
        let ev = Evidence::new().with_qr_code("A").with_location(0.0, 0.0);
        let v = s.validate(&cfg, &ev).await.unwrap();
        assert_eq!(v.failure, Some(FailureKind::Configuration));
    }

    #[tokio::test]
    async fn configuration_and_evidence_errors_are_distinct() {
        let (_, s) = setup();

        let empty = s
            .validate(&config(json!({"codes": []})), &Evidence::new().with_qr_code("A"))
            .await
            .unwrap();
        assert_eq!(empty.failure, Some(FailureKind::Configuration));

        let cfg = config(json!({"codes": [{"id": 1, "code": "A"}, {"id": 2, "code": "B", "active": false}]}));
        let missing = s.validate(&cfg, &Evidence::new()).await.unwrap();
        assert_eq!(missing.failure, Some(FailureKind::EvidenceMissing));

        let unknown = s.validate(&cfg, &Evidence::new().with_qr_code("Z")).await.unwrap();
        assert_eq!(unknown.failure, Some(FailureKind::Authorization));

        let inactive = s.validate(&cfg, &Evidence::new().with_qr_code("B")).await.unwrap();
        assert!(inactive.message.contains("inactive"));
    }

    #[tokio::test]
    async fn shared_code_text_uses_the_usable_entry() {
        let (_, s) = setup();
        let ev = Evidence::new().with_qr_code("A");

        let cfg = config(json!({"codes": [
            {"id": 1, "code": "A", "active": false},
            {"id": 2, "code": "A"}
        ]}));
        let v = s.validate(&cfg, &ev).await.unwrap();
        assert!(v.success, "{}", v.message);
        assert_eq!(v.meta("code_id"), Some(&json!("2")));

        let cfg = config(json!({"codes": [
            {"id": 1, "code": "A", "expires_at": "2026-01-01T00:00:00Z"},
            {"id": 2, "code": "A"}
        ]}));
        let v = s.validate(&cfg, &ev).await.unwrap();
        assert!(v.success, "{}", v.message);
        assert_eq!(v.meta("code_id"), Some(&json!("2")));
    }

    #[tokio::test]
    async fn oversized_rolling_window_does_not_panic() {
        let (_, s) = setup();
        let cfg = config(json!({
            "code_expiry_hours": 1e10,
            "codes": [{"id": 1, "code": "A", "created_at": "2026-03-01T00:00:00Z"}]
        }));
        let v = s.validate(&cfg, &Evidence::new().with_qr_code("A")).await.unwrap();
        assert!(v.success, "{}", v.message);
    }

    #[tokio::test]
    async fn concurrent_scans_admit_one() {
        let (_, s) = setup();
        let s = Arc::new(s);
        let cfg = Arc::new(config(json!({"codes": [{"id": 1, "code": "RACE", "one_time_use": true}]})));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let s = s.clone();
                let cfg = cfg.clone();
                tokio::spawn(async move {
                    let ev = Evidence::new().with_qr_code("RACE").with_subject(format!("emp-{i}"));
                    s.validate(&cfg, &ev).await.unwrap().success
                })
            })
            .collect();

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
