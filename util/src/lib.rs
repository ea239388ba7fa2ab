//! Shared plumbing for the presence workspace: process configuration and
//! upstream reachability checks.

pub mod config;
pub mod http;
