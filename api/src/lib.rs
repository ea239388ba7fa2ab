//! HTTP surface for the attendance validation engine.

pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
