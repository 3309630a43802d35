//! Shared application state for Axum handlers.
//!
//! The state is cloned per request; everything heavy lives behind an `Arc`.
//! No background tasks are spawned: cache expiry is passive (checked when an
//! entry is read), so the state has no lifecycle beyond construction.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::AppResult;
use crate::upstream::UpstreamClient;

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Outbound client holding the credential and connection pool
    pub upstream: UpstreamClient,
    /// Short-lived response cache for relayed upstream payloads
    pub cache: Arc<ResponseCache>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the upstream client cannot be
    /// constructed (unparseable base URL).
    pub fn new(config: Config) -> AppResult<Self> {
        let upstream = UpstreamClient::new(&config)?;
        let cache = Arc::new(ResponseCache::new(
            config.cache_ttl,
            config.cache_max_entries,
        ));

        Ok(Self {
            config: Arc::new(config),
            upstream,
            cache,
            started_at: Instant::now(),
        })
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
