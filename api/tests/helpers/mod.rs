// Each test binary uses a different subset of these.
#![allow(dead_code, unused_imports)]

pub mod app;

pub use app::{make_db_app, make_test_app, send};
