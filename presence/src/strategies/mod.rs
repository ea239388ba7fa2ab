//! # Validation Strategies
//!
//! One [`ValidationStrategy`](crate::traits::strategy::ValidationStrategy)
//! per attendance kind.
//!
//! - [`polygon`]: the punch location must lie inside configured regions.
//! - [`network`]: the client IP must belong to configured networks.
//! - [`route`]: the punch location must be near configured routes.
//! - [`code`]: a scanned code must match a configured, live code.
//!
//! They share the same outline: keep only active candidates, honour the
//! "allow without" escape flag, evaluate every candidate into a `checks`
//! audit list, then reduce with the configured
//! [`ValidationMode`](crate::settings::ValidationMode). The helpers below
//! build the verdicts that outline has in common.

pub mod code;
pub mod network;
pub mod polygon;
pub mod route;

pub use self::code::CodeStrategy;
pub use self::network::NetworkStrategy;
pub use self::polygon::PolygonStrategy;
pub use self::route::RouteStrategy;

use crate::settings::ValidationMode;
use crate::types::Verdict;

/// Success granted by an escape flag without the evidence being checked.
pub(crate) fn accepted_without(what: &str) -> Verdict {
    Verdict::degraded(format!("Attendance accepted without {what} validation"))
}

/// The verdict for an attendance type with nothing active to check against.
///
/// `configured` is the number of candidates before filtering, so an empty
/// document reads differently from one whose entries are all switched off.
pub(crate) fn no_active_candidates(noun: &str, configured: usize) -> Verdict {
    let message = if configured == 0 {
        format!("No {noun} configured for this attendance type")
    } else {
        format!("None of the {configured} configured {noun} are active")
    };
    Verdict::misconfigured(message).with("configured", configured)
}

/// Rounds meters to centimetres for metadata and messages.
pub(crate) fn round_m(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}

pub(crate) fn mode_label(mode: ValidationMode) -> &'static str {
    match mode {
        ValidationMode::Any => "any",
        ValidationMode::All => "all",
    }
}
