//! Application configuration loaded from environment variables.

use domain::{DEFAULT_MAX_QUANTITY, StatusPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `CART_MAX_QUANTITY`: per-product cart cap (default: `10`)
/// - `ORDER_STATUS_POLICY`: `strict` or `permissive` (default: `strict`)
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub cart_max_quantity: u32,
    pub status_policy: StatusPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            cart_max_quantity: lookup("CART_MAX_QUANTITY")
                .and_then(|q| q.parse().ok())
                .filter(|q| *q > 0)
                .unwrap_or(defaults.cart_max_quantity),
            status_policy: lookup("ORDER_STATUS_POLICY")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.status_policy),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            cart_max_quantity: DEFAULT_MAX_QUANTITY,
            status_policy: StatusPolicy::Strict,
        }
    }
}
