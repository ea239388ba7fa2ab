//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! Read values through the free functions at the bottom of this module
//! (`config::host()`, `config::routing_timeout_secs()`, ...).

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Hard upper bound on the routing service timeout.
pub const MAX_ROUTING_TIMEOUT_SECS: u64 = 10;

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub routing_service_url: String,
    pub routing_timeout_secs: u64,
    pub route_cache_ttl_secs: u64,
    pub code_used_ttl_days: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Parses an env var, falling back to `default` when it is unset or malformed.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every value has a default, so this never panics.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "presence".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info,presence=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/presence.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: parse_or("PORT", 3000),
            routing_service_url: env::var("ROUTING_SERVICE_URL")
                .unwrap_or_else(|_| "https://router.project-osrm.org".into()),
            routing_timeout_secs: parse_or("ROUTING_TIMEOUT_SECS", MAX_ROUTING_TIMEOUT_SECS)
                .clamp(1, MAX_ROUTING_TIMEOUT_SECS),
            route_cache_ttl_secs: parse_or("ROUTE_CACHE_TTL_SECS", 86_400),
            code_used_ttl_days: parse_or("CODE_USED_TTL_DAYS", 30),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock
                .write()
                .expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.host = value.into());
    }

    pub fn set_port(value: u16) {
        AppConfig::set_field(|cfg| cfg.port = value);
    }

    pub fn set_routing_service_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.routing_service_url = value.into());
    }

    /// Clamped to `1..=MAX_ROUTING_TIMEOUT_SECS` like the env value.
    pub fn set_routing_timeout_secs(value: u64) {
        AppConfig::set_field(|cfg| {
            cfg.routing_timeout_secs = value.clamp(1, MAX_ROUTING_TIMEOUT_SECS)
        });
    }

    pub fn set_route_cache_ttl_secs(value: u64) {
        AppConfig::set_field(|cfg| cfg.route_cache_ttl_secs = value);
    }

    pub fn set_code_used_ttl_days(value: u64) {
        AppConfig::set_field(|cfg| cfg.code_used_ttl_days = value);
    }
}

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

/// The SQLite file behind `DATABASE_PATH`, or `None` when it holds a DSN.
pub fn database_file() -> Option<String> {
    sqlite_file(&database_path())
}

/// Connection URL for `DATABASE_PATH`. A full DSN is used as given; a bare
/// path opens that SQLite file in create mode.
pub fn database_url() -> String {
    database_url_for(&database_path())
}

fn sqlite_file(path_or_url: &str) -> Option<String> {
    const SCHEMES: [&str; 3] = ["sqlite:", "postgres://", "mysql://"];
    (!SCHEMES.iter().any(|s| path_or_url.starts_with(s))).then(|| path_or_url.to_string())
}

fn database_url_for(path_or_url: &str) -> String {
    match sqlite_file(path_or_url) {
        Some(file) => format!("sqlite://{file}?mode=rwc"),
        None => path_or_url.to_string(),
    }
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn routing_service_url() -> String {
    AppConfig::global().routing_service_url.clone()
}

pub fn routing_timeout_secs() -> u64 {
    AppConfig::global().routing_timeout_secs
}

pub fn route_cache_ttl_secs() -> u64 {
    AppConfig::global().route_cache_ttl_secs
}

pub fn code_used_ttl_days() -> u64 {
    AppConfig::global().code_used_ttl_days
}
