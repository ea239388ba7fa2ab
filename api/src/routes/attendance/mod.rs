//! Attendance routes.
//!
//! - `POST /attendance/validate` → [`post::validate_attendance`]

use crate::state::AppState;
use axum::{Router, routing::post};

pub mod post;

pub fn attendance_routes() -> Router<AppState> {
    Router::new().route("/validate", post(post::validate_attendance))
}
