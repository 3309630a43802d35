//! Request ID middleware for log correlation.
//!
//! Propagates an existing `X-Request-Id` header or generates a UUIDv4 when
//! the client did not supply one, and mirrors the ID onto the response so
//! proxied weather lookups can be correlated across client, proxy log lines,
//! and upstream diagnostics. The ID is validated into a header value once
//! and reused for both directions.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID layer for the Tower middleware stack.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Request ID service wrapper.
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let id = incoming_request_id(&req).unwrap_or_else(generated_request_id);

        // Visible to handlers via request headers, mirrored onto the
        // response below
        req.headers_mut().insert(REQUEST_ID_HEADER, id.clone());
        debug!(request_id = ?id, "Tagged inbound request");

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response.headers_mut().insert(REQUEST_ID_HEADER, id);
            Ok(response)
        })
    }
}

/// A client-supplied request ID, if it is non-empty and readable.
fn incoming_request_id<B>(req: &Request<B>) -> Option<HeaderValue> {
    let value = req.headers().get(REQUEST_ID_HEADER)?;
    if value.to_str().ok()?.is_empty() {
        return None;
    }
    Some(value.clone())
}

/// A fresh UUIDv4 request ID.
fn generated_request_id() -> HeaderValue {
    // Hyphenated UUIDs are always valid header values; the fallback only
    // satisfies the lint against panicking conversions
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
