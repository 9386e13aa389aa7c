//! Configuration Module
//!
//! Handles loading and managing orchestrator configuration from environment variables.

use std::env;
use std::time::Duration;

use url::Url;

use crate::cache::GenerationNames;
use crate::lifecycle::StaticManifest;
use crate::queue::{Backoff, RetryPolicy};

/// Orchestrator configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Site origin; relative request URLs resolve against it
    pub origin: Url,
    /// Prefix shared by every generation name
    pub cache_prefix: String,
    /// Deployment version baked into generation names
    pub cache_version: String,
    /// SQLite database file
    pub database_path: String,
    /// Bound on a single network attempt in milliseconds
    pub network_timeout_ms: u64,
    /// Delivery attempts before an operation is dead-lettered
    pub max_delivery_attempts: u32,
    /// First re-drain delay in milliseconds
    pub retry_base_delay_ms: u64,
    /// Ceiling for the re-drain delay in milliseconds
    pub retry_max_delay_ms: u64,
    /// Menu refresh interval in seconds, 0 disables
    pub menu_refresh_interval: u64,
    /// Activate right after a successful install
    pub skip_waiting: bool,
    /// Title used on notifications
    pub app_name: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ORIGIN` - Site origin (default: http://localhost:8080)
    /// - `CACHE_PREFIX` - Generation name prefix (default: bella-vista)
    /// - `CACHE_VERSION` - Deployment version (default: 1.0.0)
    /// - `DATABASE_PATH` - SQLite file (default: offline_orders.db)
    /// - `NETWORK_TIMEOUT_MS` - Network attempt bound (default: 10000)
    /// - `MAX_DELIVERY_ATTEMPTS` - Retry budget per queued operation (default: 5)
    /// - `RETRY_BASE_DELAY_MS` - First re-drain delay (default: 1000)
    /// - `RETRY_MAX_DELAY_MS` - Re-drain delay ceiling (default: 60000)
    /// - `MENU_REFRESH_INTERVAL` - Seconds between menu refreshes (default: 900)
    /// - `SKIP_WAITING` - Activate immediately after install (default: true)
    /// - `APP_NAME` - Notification title (default: Bella Vista Restaurant)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            origin: env::var("ORIGIN")
                .ok()
                .and_then(|v| Url::parse(&v).ok())
                .unwrap_or(defaults.origin),
            cache_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),
            cache_version: env::var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            network_timeout_ms: parse_var("NETWORK_TIMEOUT_MS")
                .unwrap_or(defaults.network_timeout_ms),
            max_delivery_attempts: parse_var("MAX_DELIVERY_ATTEMPTS")
                .unwrap_or(defaults.max_delivery_attempts),
            retry_base_delay_ms: parse_var("RETRY_BASE_DELAY_MS")
                .unwrap_or(defaults.retry_base_delay_ms),
            retry_max_delay_ms: parse_var("RETRY_MAX_DELAY_MS")
                .unwrap_or(defaults.retry_max_delay_ms),
            menu_refresh_interval: parse_var("MENU_REFRESH_INTERVAL")
                .unwrap_or(defaults.menu_refresh_interval),
            skip_waiting: parse_var("SKIP_WAITING").unwrap_or(defaults.skip_waiting),
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
        }
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn generation_names(&self) -> GenerationNames {
        GenerationNames::new(&self.cache_prefix, &self.cache_version)
    }

    pub fn manifest(&self) -> StaticManifest {
        StaticManifest::storefront(&self.cache_version)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_delivery_attempts,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.retry_base_delay_ms),
                max: Duration::from_millis(self.retry_max_delay_ms),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            origin: Url::parse("http://localhost:8080").expect("default origin is a valid URL"),
            cache_prefix: "bella-vista".to_string(),
            cache_version: "1.0.0".to_string(),
            database_path: "offline_orders.db".to_string(),
            network_timeout_ms: 10_000,
            max_delivery_attempts: 5,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 60_000,
            menu_refresh_interval: 900,
            skip_waiting: true,
            app_name: "Bella Vista Restaurant".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
