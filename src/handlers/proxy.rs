//! The forwarding pipeline behind `GET /api`.
//!
//! Per request: rate limiting has already run in middleware, so this
//! handler consults the response cache, and on a miss performs the single
//! outbound call with the credential injected, relays the reply, and
//! populates the cache.
//!
//! # Status Relaying
//!
//! Any HTTP reply from the upstream is relayed to the client under 200,
//! including upstream error bodies; callers distinguish upstream
//! application errors by inspecting the body. Only transport-level failures
//! produce a 500, and those never create a cache entry.

use std::time::{Duration, Instant};

use axum::extract::{Query, RawQuery, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::cache::ResponseCache;
use crate::error::AppResult;
use crate::metrics;
use crate::state::AppState;

/// Value of the `X-Cache` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Hit,
    Miss,
    /// Caching disabled by configuration
    Bypass,
}

impl CacheStatus {
    fn header_value(self) -> HeaderValue {
        match self {
            Self::Hit => HeaderValue::from_static("HIT"),
            Self::Miss => HeaderValue::from_static("MISS"),
            Self::Bypass => HeaderValue::from_static("BYPASS"),
        }
    }
}

/// Forward a request to the upstream weather API.
///
/// Query parameters arrive twice on purpose: raw for the cache key (kept
/// verbatim, so parameter order matters) and parsed as ordered pairs for
/// outbound URL construction.
#[instrument(skip(state, params, raw_query))]
pub async fn forward(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Response> {
    let caching = state.config.caching_enabled();
    let key = ResponseCache::key("/api", raw_query.as_deref());

    if caching {
        if let Some(hit) = state.cache.get(&key) {
            debug!(key = %key, "Serving cached upstream response");
            metrics::record_cache_hit();
            metrics::record_request("cache_hit");
            return Ok(relay(
                hit.body.clone(),
                hit.content_type.as_deref(),
                Some(hit.remaining_ttl()),
                CacheStatus::Hit,
            ));
        }
        metrics::record_cache_miss();
    }

    let started = Instant::now();
    let reply = match state.upstream.fetch(&params).await {
        Ok(reply) => reply,
        Err(e) => {
            metrics::record_upstream_failure();
            metrics::record_request("upstream_error");
            return Err(e);
        }
    };
    metrics::record_upstream_duration(started.elapsed().as_secs_f64());

    if !reply.status.is_success() {
        // Deliberate simplification carried over from the original design:
        // the client still sees 200 and the upstream's error body.
        debug!(
            upstream_status = reply.status.as_u16(),
            "Relaying upstream non-success body under 200"
        );
    }

    let (max_age, status) = if caching {
        state.cache.insert(
            key,
            reply.body.clone(),
            reply.content_type.clone(),
            reply.status.as_u16(),
        );
        (Some(state.config.cache_ttl), CacheStatus::Miss)
    } else {
        (None, CacheStatus::Bypass)
    };

    metrics::record_request("relayed");
    Ok(relay(reply.body, reply.content_type.as_deref(), max_age, status))
}

/// Build the client-facing 200 response around relayed body bytes.
///
/// `max_age` drives a `Cache-Control` header counting down the entry's
/// remaining lifetime; absent when caching is disabled.
fn relay(
    body: Bytes,
    content_type: Option<&str>,
    max_age: Option<Duration>,
    status: CacheStatus,
) -> Response {
    let mut headers = HeaderMap::new();

    let content_type = content_type.unwrap_or("application/json");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }

    if let Some(max_age) = max_age
        && let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age.as_secs()))
    {
        headers.insert(header::CACHE_CONTROL, value);
    }

    headers.insert("x-cache", status.header_value());

    (StatusCode::OK, headers, body).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_defaults_to_json_content_type() {
        let response = relay(Bytes::from_static(b"{}"), None, None, CacheStatus::Bypass);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.headers().get("x-cache").unwrap(), "BYPASS");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[test]
    fn test_relay_carries_countdown_max_age() {
        let response = relay(
            Bytes::from_static(b"{}"),
            Some("application/json; charset=utf-8"),
            Some(Duration::from_secs(95)),
            CacheStatus::Hit,
        );

        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=95"
        );
        assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");
    }
}
