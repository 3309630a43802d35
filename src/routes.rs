//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers, 429 responses included
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if exceeded; cache and upstream never run
//! └────────┬─────────┘
//!          │
//!          ▼
//!   /api handler (cache → forward)   or   static bundle fallback
//! ```
//!
//! # Routes
//!
//! - `GET /api` - The forwarding pipeline (arbitrary query parameters)
//! - `GET /health` - Liveness
//! - everything else - Static frontend bundle from `STATIC_DIR`

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{RateLimitError, RateLimitLayer, RequestIdLayer};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Rate limiting is attached only when `rate_limit_max > 0`; the static
/// fallback serves the frontend bundle so the browser client and the proxy
/// share one origin.
///
/// # Errors
///
/// Returns `RateLimitError` if rate limiting configuration is invalid.
pub fn build_router(state: AppState) -> Result<Router, RateLimitError> {
    let config = &state.config;

    let cors = build_cors_layer(&config.cors_allowed_origins);

    let mut router = Router::new()
        .route("/api", get(handlers::forward))
        .route("/health", get(handlers::health_check))
        // Frontend bundle at the server root
        .fallback_service(ServeDir::new(&config.static_dir));

    // Middleware is applied bottom to top. The limiter is added first so it
    // sits innermost: a 429 never touches the cache or the upstream, but it
    // still passes back out through tracing, request-id, and CORS, so
    // rejected requests stay correlatable and readable cross-origin.
    if config.rate_limiting_enabled() {
        info!(
            max = config.rate_limit_max,
            window_secs = config.rate_limit_window.as_secs(),
            trusted_hops = config.trusted_proxy_hops,
            "Rate limiting enabled"
        );
        router = router.layer(RateLimitLayer::new(
            config.rate_limit_max,
            config.rate_limit_window,
            config.trusted_proxy_hops,
        )?);
    } else {
        info!("Rate limiting disabled (RATE_LIMIT_MAX=0)");
    }

    router = router.layer(TraceLayer::new_for_http());
    router = router.layer(RequestIdLayer::new());
    router = router.layer(cors);

    Ok(router.with_state(state))
}

/// Build CORS layer from configuration.
///
/// # Security Note
///
/// Using `*` (any origin) is convenient for development but should be
/// avoided in production. Specify explicit origins instead.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_build_router_with_default_config() {
        let state = AppState::new(Config::default()).unwrap();
        assert!(build_router(state).is_ok());
    }

    #[test]
    fn test_build_router_without_rate_limiting() {
        let state = AppState::new(Config {
            rate_limit_max: 0,
            ..Config::default()
        })
        .unwrap();
        assert!(build_router(state).is_ok());
    }

    #[test]
    fn test_build_cors_layer_any() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_build_cors_layer_specific() {
        let origins = vec![
            "https://example.com".to_string(),
            "https://app.example.com".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
        // Just verify it doesn't panic
    }
}
