//! HTTP middleware for rate limiting and observability.
//!
//! # Architecture
//!
//! ```text
//! Request → Rate Limiter → Request ID → Trace/CORS → Handler → Response
//!               ↓               ↓
//!       429 Too Many      X-Request-Id header
//! ```
//!
//! The rate limiter runs first: a rejected request never consults the
//! response cache and never triggers an upstream call. Client identity is
//! derived from the peer socket address, honoring a configured number of
//! trusted reverse-proxy hops in the `X-Forwarded-For` chain; the hop count
//! comes from configuration only and cannot be widened by request headers.

pub mod ip;
pub mod rate_limit;
pub mod request_id;

pub use ip::{UNKNOWN_CLIENT, client_identity};
pub use rate_limit::{Decision, FixedWindowLimiter, RateLimitError, RateLimitLayer};
pub use request_id::RequestIdLayer;
