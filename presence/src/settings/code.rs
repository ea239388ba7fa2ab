use super::{
    Vertex, lenient_active, lenient_bool, lenient_f64, lenient_id, lenient_list,
    lenient_opt_bool, lenient_string, strict_opt_datetime,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Allowed distance from a code's location when nothing else is configured.
pub const DEFAULT_MAX_DISTANCE_M: f64 = 100.0;

/// Settings for `qr_code` attendance types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeConfig {
    #[serde(default, alias = "qr_codes", deserialize_with = "lenient_list")]
    pub codes: Vec<CodeEntry>,
    /// Rolling validity measured from each code's `created_at`.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub code_expiry_hours: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub one_time_use: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub require_location: bool,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_distance: Option<f64>,
}

/// One printable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, alias = "value", deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(default = "super::default_true", alias = "is_active", deserialize_with = "lenient_active")]
    pub active: bool,
    #[serde(default, deserialize_with = "strict_opt_datetime")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "strict_opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub one_time_use: Option<bool>,
    /// Where the code is posted; punches must happen near it.
    #[serde(default, alias = "required_location")]
    pub location: Option<Vertex>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_distance: Option<f64>,
}

/// Why a code is no longer usable at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Absolute(DateTime<Utc>),
    Rolling(DateTime<Utc>),
}

/// Outcome of looking a scanned code up among entries sharing its text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CodeLookup<'a> {
    Usable(&'a CodeEntry),
    Expired(&'a CodeEntry, Expiry),
    Inactive(&'a CodeEntry),
    Unknown,
}

impl CodeConfig {
    pub fn active_codes(&self) -> impl Iterator<Item = &CodeEntry> {
        self.codes.iter().filter(|c| c.active)
    }

    /// Picks the first entry with this text that is active and unexpired at
    /// `now`. When none qualifies, an expired active entry is reported ahead
    /// of an inactive one.
    pub fn lookup(&self, scanned: &str, now: DateTime<Utc>) -> CodeLookup<'_> {
        let mut expired = None;
        let mut inactive = None;

        for entry in self.codes.iter().filter(|c| c.code.trim() == scanned) {
            if !entry.active {
                inactive.get_or_insert(entry);
                continue;
            }
            match self.expired(entry, now) {
                None => return CodeLookup::Usable(entry),
                Some(why) => {
                    expired.get_or_insert((entry, why));
                }
            }
        }

        match (expired, inactive) {
            (Some((entry, why)), _) => CodeLookup::Expired(entry, why),
            (None, Some(entry)) => CodeLookup::Inactive(entry),
            (None, None) => CodeLookup::Unknown,
        }
    }

    pub fn is_one_time(&self, entry: &CodeEntry) -> bool {
        entry.one_time_use.unwrap_or(false) || self.one_time_use
    }

    pub fn requires_location(&self, entry: &CodeEntry) -> bool {
        self.require_location || entry.location.is_some()
    }

    pub fn max_distance_for(&self, entry: &CodeEntry) -> f64 {
        entry
            .max_distance
            .or(self.max_distance)
            .unwrap_or(DEFAULT_MAX_DISTANCE_M)
            .max(0.0)
    }

    /// The expiry that has passed at `now`, if any. The absolute
    /// `expires_at` is checked first.
    pub fn expired(&self, entry: &CodeEntry, now: DateTime<Utc>) -> Option<Expiry> {
        if let Some(at) = entry.expires_at {
            if now >= at {
                return Some(Expiry::Absolute(at));
            }
        }
        let (Some(hours), Some(created)) = (self.code_expiry_hours, entry.created_at) else {
            return None;
        };
        if !hours.is_finite() || hours <= 0.0 {
            return None;
        }
        // A window past chrono's range never closes.
        let until = TimeDelta::try_seconds((hours * 3600.0).round() as i64)
            .and_then(|window| created.checked_add_signed(window))?;
        (now >= until).then_some(Expiry::Rolling(until))
    }
}

impl CodeEntry {
    /// Key under which single-use consumption is recorded.
    pub fn token_id(&self) -> &str {
        if self.id.is_empty() { self.code.trim() } else { &self.id }
    }
}
