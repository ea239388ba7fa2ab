//!
//! Traits Module
//!
//! The seams of the engine. Implement these to plug in a new cache backend,
//! routing provider or evidence type.
//!
//! - [`cache`]: TTL-scoped key/value storage backing the replay guard.
//! - [`routing`]: external path-geometry provider used by route validation.
//! - [`strategy`]: one validator per attendance kind.

pub mod cache;
pub mod routing;
pub mod strategy;
