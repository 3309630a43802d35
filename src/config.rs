//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Required Values
//!
//! - `UPSTREAM_BASE_URL`: Base URL of the weather API being proxied
//! - `UPSTREAM_API_KEY`: The credential injected into every outbound request
//!
//! Startup fails fast with a configuration error when either is missing, so a
//! misconfigured deployment never emits malformed (credential-less) upstream
//! requests.
//!
//! # Tuning
//!
//! - `RATE_LIMIT_MAX` / `RATE_LIMIT_WINDOW_SECS`: Per-client request budget
//! - `CACHE_TTL_SECS`: How long a relayed response is served from memory
//! - `TRUSTED_PROXY_HOPS`: Reverse-proxy hops honored for client identity

use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Runtime environment mode.
///
/// Controls whether the outbound URL (which embeds the credential) may be
/// written to diagnostic logs. Only `Development` permits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse from the `APP_ENV` variable. Anything other than `production`
    /// (case-insensitive) is treated as development.
    fn from_env() -> Self {
        match env::var("APP_ENV") {
            Ok(v) if v.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Runtime environment, gates credential-bearing diagnostics
    pub environment: Environment,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Base URL of the proxied weather API (required)
    pub upstream_base_url: String,

    /// Query-parameter name the upstream expects the credential under
    /// (default: "key")
    pub credential_param: String,

    /// Credential value, held server-side only (required).
    /// Invariant: never serialized into a client-visible response or a
    /// production log line.
    pub credential_value: String,

    /// Timeout for the single outbound call (default: 30 seconds)
    pub upstream_timeout: Duration,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Maximum requests per window per client identity (default: 100)
    /// Set to 0 to disable rate limiting
    pub rate_limit_max: u32,

    /// Length of the fixed rate-limit window (default: 900 seconds)
    pub rate_limit_window: Duration,

    /// Number of trusted reverse-proxy hops when deriving the client
    /// identity from `X-Forwarded-For` (default: 0 = use the socket peer)
    pub trusted_proxy_hops: usize,

    // =========================================================================
    // Response Cache Configuration
    // =========================================================================
    /// Time-to-live for cached upstream responses (default: 120 seconds)
    /// Set to 0 to disable caching
    pub cache_ttl: Duration,

    /// Maximum cached entries; 0 = unbounded, matching the original
    /// behavior. When bounded, expired entries are purged first and the
    /// oldest entry is evicted if the cache is still full.
    pub cache_max_entries: usize,

    // =========================================================================
    // Frontend / CORS Configuration
    // =========================================================================
    /// Directory the static frontend bundle is served from (default: "public")
    pub static_dir: String,

    /// Comma-separated list of allowed CORS origins
    /// Use "*" to allow all origins (not recommended for production)
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a required value is absent or any
    /// value fails to parse (e.g., non-numeric PORT).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            environment: Environment::from_env(),

            // Upstream
            upstream_base_url: Self::require_env("UPSTREAM_BASE_URL")?,
            credential_param: env::var("UPSTREAM_KEY_PARAM").unwrap_or_else(|_| "key".to_string()),
            credential_value: Self::require_env("UPSTREAM_API_KEY")?,
            upstream_timeout: Duration::from_secs(Self::parse_env("UPSTREAM_TIMEOUT_SECS", 30)?),

            // Rate limiting
            rate_limit_max: Self::parse_env("RATE_LIMIT_MAX", 100)?,
            rate_limit_window: Duration::from_secs(Self::parse_env("RATE_LIMIT_WINDOW_SECS", 900)?),
            trusted_proxy_hops: Self::parse_env("TRUSTED_PROXY_HOPS", 0)?,

            // Response cache
            cache_ttl: Duration::from_secs(Self::parse_env("CACHE_TTL_SECS", 120)?),
            cache_max_entries: Self::parse_env("CACHE_MAX_ENTRIES", 0)?,

            // Frontend / CORS
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()),
            cors_allowed_origins: Self::parse_cors_origins(),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if self.upstream_base_url.trim().is_empty() {
            return Err(AppError::ConfigError(
                "UPSTREAM_BASE_URL must not be empty".to_string(),
            ));
        }

        if !self.upstream_base_url.starts_with("http://")
            && !self.upstream_base_url.starts_with("https://")
        {
            return Err(AppError::ConfigError(format!(
                "UPSTREAM_BASE_URL must be an http(s) URL, got {:?}",
                self.upstream_base_url
            )));
        }

        if self.credential_value.trim().is_empty() {
            return Err(AppError::ConfigError(
                "UPSTREAM_API_KEY must not be empty".to_string(),
            ));
        }

        if self.credential_param.trim().is_empty() {
            return Err(AppError::ConfigError(
                "UPSTREAM_KEY_PARAM must not be empty".to_string(),
            ));
        }

        if self.rate_limit_max > 0 && self.rate_limit_window.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_WINDOW_SECS must be greater than 0 when rate limiting is enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_max > 0
    }

    /// Check if response caching is enabled.
    pub fn caching_enabled(&self) -> bool {
        !self.cache_ttl.is_zero()
    }

    /// Check if the process is running in production mode.
    ///
    /// In production the outbound URL (which carries the credential) is
    /// never logged.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Read a required environment variable, failing fast when absent.
    fn require_env(name: &str) -> AppResult<String> {
        env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError(format!("{name} is required but missing or empty"))
            })
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse CORS allowed origins from environment variable.
    fn parse_cors_origins() -> Vec<String> {
        env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::Development,
            // Upstream
            upstream_base_url: "http://localhost:9100/data".to_string(),
            credential_param: "key".to_string(),
            credential_value: "test-api-key".to_string(),
            upstream_timeout: Duration::from_secs(30),
            // Rate limiting
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(900),
            trusted_proxy_hops: 0,
            // Response cache
            cache_ttl: Duration::from_secs(120),
            cache_max_entries: 0, // unbounded
            // Frontend / CORS
            static_dir: "public".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            // Observability
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}
