//! Fixed-window rate limiting middleware.
//!
//! # Algorithm
//!
//! Each client identity owns a counter and a window-start timestamp. The
//! first request from an identity opens its window; requests increment the
//! counter until the window length elapses, at which point the counter
//! resets. A request that would push the counter past the configured
//! maximum is rejected with 429 before the cache or the forwarding handler
//! run. Rejection is a leaf outcome: no queueing, no retry scheduling.
//!
//! # Configuration
//!
//! - `RATE_LIMIT_MAX`: Requests allowed per window per client
//! - `RATE_LIMIT_WINDOW_SECS`: Window length
//! - `TRUSTED_PROXY_HOPS`: Reverse-proxy hops honored for client identity
//!
//! # Response Headers
//!
//! Every response passing through the limiter carries:
//! - `X-RateLimit-Limit`: Configured per-window maximum
//! - `X-RateLimit-Remaining`: Requests left in the current window
//! - `X-RateLimit-Reset`: Seconds until the current window resets
//!
//! A 429 additionally carries `Retry-After`.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use dashmap::DashMap;
use tower::{Layer, Service};
use tracing::warn;

use super::ip::client_identity;
use crate::metrics;

/// Counter maps are pruned of elapsed windows once they grow past this many
/// identities, bounding memory under identity churn.
const PRUNE_THRESHOLD: usize = 10_000;

/// Error type for rate limit layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Per-window maximum cannot be zero.
    ZeroMax,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroMax => {
                write!(
                    f,
                    "per-window maximum must be greater than 0; omit the layer for no limiting"
                )
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

// =============================================================================
// Fixed-Window Counter
// =============================================================================

/// A client identity's current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// The outcome of checking one request against the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured per-window maximum
    pub limit: u32,
    /// Requests left in the current window after this one
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

/// Keyed fixed-window request counter.
///
/// Counters are created lazily on a client's first request and reset in
/// place once their window elapses.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    max: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Create a limiter allowing `max` requests per `window` per identity.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroMax` if `max` is 0.
    pub fn new(max: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max == 0 {
            return Err(RateLimitError::ZeroMax);
        }
        Ok(Self {
            windows: DashMap::new(),
            max,
            window,
        })
    }

    /// Count one request against `key` and decide whether it may proceed.
    ///
    /// The counter write happens before any await point in the request's
    /// lifetime, so a burst of concurrent requests from one identity cannot
    /// slip past the maximum.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                started_at: now,
                count: 0,
            });

        // Window elapsed: reset in place
        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);
        let decision = Decision {
            allowed: entry.count <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.count),
            reset_after: self
                .window
                .saturating_sub(now.duration_since(entry.started_at)),
        };
        drop(entry);

        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        decision
    }

    /// Drop counters whose window has fully elapsed.
    fn prune(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.duration_since(w.started_at) < self.window);
    }

    /// Number of identities currently tracked.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.len()
    }
}

// =============================================================================
// Tower Layer / Service
// =============================================================================

/// Rate limiting layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let layer = RateLimitLayer::new(100, Duration::from_secs(900), 0)?;
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(layer);
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<FixedWindowLimiter>,
    /// Trusted reverse-proxy hops for identity derivation
    trusted_hops: usize,
}

impl RateLimitLayer {
    /// Create a per-client rate limit layer.
    ///
    /// # Arguments
    ///
    /// * `max` - Requests allowed per window per client identity
    /// * `window` - Fixed window length
    /// * `trusted_hops` - Reverse-proxy hops honored when deriving identity
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroMax` if `max` is 0; omit the layer
    /// entirely to disable limiting.
    pub fn new(max: u32, window: Duration, trusted_hops: usize) -> Result<Self, RateLimitError> {
        Ok(Self {
            limiter: Arc::new(FixedWindowLimiter::new(max, window)?),
            trusted_hops,
        })
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            trusted_hops: self.trusted_hops,
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<FixedWindowLimiter>,
    trusted_hops: usize,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        // Identity and counter update happen synchronously, before the
        // request suspends on anything
        let identity = client_identity(&req, self.trusted_hops).into_owned();
        let decision = self.limiter.check(&identity);

        Box::pin(async move {
            if !decision.allowed {
                let retry_after = decision.reset_after.as_secs().max(1);

                warn!(
                    client = %identity,
                    path = %req.uri().path(),
                    retry_after_secs = retry_after,
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited();

                let response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    [
                        ("Retry-After", retry_after.to_string()),
                        ("X-RateLimit-Limit", decision.limit.to_string()),
                        ("X-RateLimit-Remaining", "0".to_string()),
                        ("X-RateLimit-Reset", retry_after.to_string()),
                    ],
                    "Rate limit exceeded. Please retry later.",
                )
                    .into_response();

                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            attach_limit_headers(&mut response, decision);
            Ok(response)
        })
    }
}

/// Attach limit/remaining/reset headers so callers can self-throttle.
fn attach_limit_headers(response: &mut Response<Body>, decision: Decision) {
    let headers = response.headers_mut();
    let pairs = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        (
            "x-ratelimit-reset",
            decision.reset_after.as_secs().to_string(),
        ),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_zero_max_returns_error() {
        let result = FixedWindowLimiter::new(0, Duration::from_secs(60));
        assert!(matches!(result, Err(RateLimitError::ZeroMax)));
    }

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(900)).unwrap();

        for i in 0..5 {
            let decision = limiter.check("10.0.0.1");
            assert!(decision.allowed, "request {} should pass", i + 1);
            assert_eq!(decision.remaining, 4 - i);
        }

        let sixth = limiter.check("10.0.0.1");
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.limit, 5);
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(900)).unwrap();

        assert!(limiter.check("10.0.0.1").allowed);
        assert!(!limiter.check("10.0.0.1").allowed);

        // A different client still has its full budget
        assert!(limiter.check("10.0.0.2").allowed);
    }

    #[test]
    fn test_window_reset_restores_budget() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_millis(40)).unwrap();

        assert!(limiter.check("c").allowed);
        assert!(limiter.check("c").allowed);
        assert!(!limiter.check("c").allowed);

        sleep(Duration::from_millis(60));

        let after = limiter.check("c");
        assert!(after.allowed);
        assert_eq!(after.remaining, 1);
    }

    #[test]
    fn test_reset_after_never_exceeds_window() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(900)).unwrap();
        let decision = limiter.check("c");
        assert!(decision.reset_after <= Duration::from_secs(900));
        assert!(decision.reset_after > Duration::from_secs(890));
    }

    #[test]
    fn test_counters_created_lazily() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(900)).unwrap();
        assert_eq!(limiter.tracked(), 0);

        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_layer_creation() {
        assert!(RateLimitLayer::new(100, Duration::from_secs(60), 0).is_ok());
        assert!(matches!(
            RateLimitLayer::new(0, Duration::from_secs(60), 0),
            Err(RateLimitError::ZeroMax)
        ));
    }
}
