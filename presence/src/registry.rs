//! # Strategy Registry
//!
//! Maps an attendance kind to the constructor of its strategy.
//!
//! Raw kind strings are normalized first (`wifi_ip_2` → `wifi_ip`); a
//! string that names no known kind is a
//! [`PresenceError::UnknownKind`]. The default table is built from an
//! exhaustive `match`, so adding an [`AttendanceKind`] variant fails to
//! compile until it has a strategy.

use crate::clock::Clock;
use crate::error::PresenceError;
use crate::replay_guard::ReplayGuard;
use crate::route_resolver::{OsrmClient, RouteResolver};
use crate::settings::AttendanceKind;
use crate::strategies::{CodeStrategy, NetworkStrategy, PolygonStrategy, RouteStrategy};
use crate::traits::cache::CacheStore;
use crate::traits::routing::RoutingService;
use crate::traits::strategy::ValidationStrategy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Shared collaborators handed to strategy constructors.
#[derive(Clone)]
pub struct StrategyContext {
    pub clock: Arc<dyn Clock>,
    pub replay: Arc<ReplayGuard>,
    pub routes: Arc<RouteResolver>,
}

impl StrategyContext {
    pub fn new(clock: Arc<dyn Clock>, replay: Arc<ReplayGuard>, routes: Arc<RouteResolver>) -> Self {
        Self {
            clock,
            replay,
            routes,
        }
    }

    /// Wires replay retention, the routing client and the route cache from
    /// the global configuration. An unusable routing client leaves route
    /// checks on waypoint fallback; a zero route TTL disables memoization.
    pub fn from_config(cache: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        let retention = Duration::from_secs(util::config::code_used_ttl_days().saturating_mul(24 * 60 * 60));
        let replay = ReplayGuard::new(cache.clone(), clock.clone()).with_retention(retention);

        let service: Option<Arc<dyn RoutingService>> = match OsrmClient::from_config() {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                warn!(error = %err, "Routing client unavailable; route checks use waypoint fallback");
                None
            }
        };
        let mut routes = RouteResolver::new(service);
        let route_ttl = util::config::route_cache_ttl_secs();
        if route_ttl > 0 {
            routes = routes.with_cache(cache, Duration::from_secs(route_ttl));
        }

        Self::new(clock, Arc::new(replay), Arc::new(routes))
    }
}

pub type StrategyCtor = fn(&StrategyContext) -> Box<dyn ValidationStrategy>;

/// The built-in constructor for `kind`.
pub fn constructor_for(kind: AttendanceKind) -> StrategyCtor {
    match kind {
        AttendanceKind::GeoPolygon => polygon,
        AttendanceKind::WifiIp => network,
        AttendanceKind::RouteWaypoint => route,
        AttendanceKind::QrCode => code,
    }
}

fn polygon(_: &StrategyContext) -> Box<dyn ValidationStrategy> {
    Box::new(PolygonStrategy)
}

fn network(_: &StrategyContext) -> Box<dyn ValidationStrategy> {
    Box::new(NetworkStrategy)
}

fn route(ctx: &StrategyContext) -> Box<dyn ValidationStrategy> {
    Box::new(RouteStrategy::new(ctx.routes.clone()))
}

fn code(ctx: &StrategyContext) -> Box<dyn ValidationStrategy> {
    Box::new(CodeStrategy::new(ctx.clock.clone(), ctx.replay.clone()))
}

pub struct StrategyRegistry {
    context: StrategyContext,
    constructors: HashMap<AttendanceKind, StrategyCtor>,
}

impl StrategyRegistry {
    pub fn new(context: StrategyContext) -> Self {
        let constructors = AttendanceKind::ALL
            .into_iter()
            .map(|kind| (kind, constructor_for(kind)))
            .collect();
        Self {
            context,
            constructors,
        }
    }

    /// Replaces the constructor for one kind.
    pub fn with_constructor(mut self, kind: AttendanceKind, ctor: StrategyCtor) -> Self {
        self.constructors.insert(kind, ctor);
        self
    }

    pub fn context(&self) -> &StrategyContext {
        &self.context
    }

    /// Builds the strategy for a raw kind string such as `"qr_code_2"`.
    pub fn resolve(&self, raw_kind: &str) -> Result<Box<dyn ValidationStrategy>, PresenceError> {
        let kind: AttendanceKind = raw_kind.parse().map_err(|raw: String| {
            warn!(kind = %raw, "Unknown attendance type kind");
            PresenceError::UnknownKind(raw)
        })?;

        self.constructors
            .get(&kind)
            .map(|ctor| ctor(&self.context))
            .ok_or_else(|| PresenceError::UnknownKind(raw_kind.to_string()))
    }
}
