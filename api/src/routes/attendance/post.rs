use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use presence::settings::AttendanceTypeConfig;
use presence::types::Evidence;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::error;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateAttendanceRequest {
    pub attendance_type: AttendanceTypeConfig,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,

    #[validate(length(max = 512, message = "QR code must be at most 512 characters"))]
    pub qr_code: Option<String>,

    #[validate(length(min = 1, max = 128, message = "Employee id must be 1 to 128 characters"))]
    pub employee_id: Option<String>,
}

impl ValidateAttendanceRequest {
    fn evidence(&self, peer: SocketAddr, headers: &HeaderMap) -> Evidence {
        let mut evidence = Evidence::new().with_remote_addr(peer.ip().to_string());

        if let (Some(lat), Some(lng)) = (self.latitude, self.longitude) {
            evidence = evidence.with_location(lat, lng);
        }
        if let Some(code) = &self.qr_code {
            evidence = evidence.with_qr_code(code.as_str());
        }
        if let Some(employee) = &self.employee_id {
            evidence = evidence.with_subject(employee.as_str());
        }
        if let Some(v) = header_str(headers, "x-forwarded-for") {
            evidence = evidence.with_forwarded_for(v);
        }
        if let Some(v) = header_str(headers, "x-real-ip") {
            evidence = evidence.with_real_ip(v);
        }
        evidence
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| {
            errs.iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// POST /attendance/validate
///
/// Validates one punch against an attendance type. The client IP is read
/// from `X-Forwarded-For`, then `X-Real-IP`, then the TCP peer.
///
/// ### Request Body
/// ```json
/// {
///   "attendance_type": {
///     "kind": "geo_polygon",
///     "settings": { "regions": [ { "id": 1, "name": "HQ", "coordinates": [ ... ] } ] }
///   },
///   "latitude": -6.2088,
///   "longitude": 106.8456,
///   "qr_code": null,
///   "employee_id": "E-1042"
/// }
/// ```
///
/// ### Responses
///
/// The HTTP status mirrors the verdict: `200` accepted, `403` refused,
/// `422` misconfigured or missing evidence. `data` is the verdict itself.
///
/// - `200 OK`
/// ```json
/// {
///   "success": true,
///   "data": {
///     "success": true,
///     "message": "Location is inside HQ",
///     "status": 200,
///     "metadata": { "matched_region_id": "1", "checks": [ ... ] }
///   },
///   "message": "Location is inside HQ"
/// }
/// ```
///
/// - `400 Bad Request` (out-of-range coordinates, oversized fields)
/// - `500 Internal Server Error` (replay cache unavailable)
pub async fn validate_attendance(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ValidateAttendanceRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return ApiResponse::<Value>::error(format_validation_errors(&errors))
            .with_status(StatusCode::BAD_REQUEST);
    }

    let evidence = req.evidence(peer, &headers);

    match state.engine().validate(&req.attendance_type, &evidence).await {
        Ok(verdict) => {
            let status = StatusCode::from_u16(verdict.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let message = verdict.message.clone();
            let body = if verdict.success {
                ApiResponse::success(verdict, message)
            } else {
                ApiResponse::failure(verdict, message)
            };
            (status, Json(body)).into_response()
        }
        Err(err) => {
            error!(kind = %req.attendance_type.kind, error = %err, "Attendance validation failed");
            ApiResponse::<Value>::error("Attendance could not be validated; please try again")
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
