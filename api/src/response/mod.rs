use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;

/// Envelope for every JSON body the API returns.
///
/// ```json
/// {
///   "success": true,
///   "data": { ... },
///   "message": "Attendance validated"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    /// Failure carrying a payload, for verdicts whose detail matters to the
    /// caller even when the punch is refused.
    pub fn failure(data: T, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            message: message.into(),
        }
    }

    /// Failure with an empty payload.
    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }

    /// Pairs the envelope with an HTTP status.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
