use crate::error::PresenceError;
use crate::settings::{AttendanceKind, AttendanceTypeConfig};
use crate::types::{Evidence, Verdict};
use async_trait::async_trait;

/// Validates one kind of evidence against an attendance type's settings.
///
/// Every rule outcome is a [`Verdict`]. `Err` is reserved for backend
/// failures the caller must see, such as an unreachable replay cache.
#[async_trait]
pub trait ValidationStrategy: Send + Sync {
    fn kind(&self) -> AttendanceKind;

    async fn validate(
        &self,
        config: &AttendanceTypeConfig,
        evidence: &Evidence,
    ) -> Result<Verdict, PresenceError>;
}
