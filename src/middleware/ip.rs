//! Client identity derivation for rate limiting.
//!
//! The rate limiter keys its counters on a client identity derived from the
//! request's network origin. Derivation honors a configurable number of
//! trusted reverse-proxy hops:
//!
//! - **0 hops** (direct deployment): the peer socket address is the client.
//!   `X-Forwarded-For` is ignored entirely, so clients cannot spoof their
//!   identity by setting the header themselves.
//! - **N hops** (behind N reverse proxies): the client address is taken N
//!   entries from the end of the `X-Forwarded-For` chain, since the last N
//!   entries were appended by the trusted proxies. A chain shorter than N
//!   falls back to its first entry.
//!
//! The hop count comes from configuration only; no request header can widen
//! the trust.
//!
//! # The "unknown" Fallback
//!
//! When neither a socket address nor a usable header is available, requests
//! share the `"unknown"` key and are collectively rate-limited. Monitor for
//! high "unknown" traffic in production logs.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback identity when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the rate-limit identity for a request.
///
/// # Returns
///
/// `Cow<'static, str>` - borrowed for the "unknown" fallback (no
/// allocation), owned for actual addresses. Use `.into_owned()` when the
/// value must outlive the request reference.
pub fn client_identity<B>(req: &Request<B>, trusted_hops: usize) -> Cow<'static, str> {
    if trusted_hops > 0
        && let Some(ip) = forwarded_client_ip(req, trusted_hops)
    {
        return Cow::Owned(ip.to_string());
    }

    // Peer socket address, present when the server is built with
    // `into_make_service_with_connect_info`
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Cow::Owned(addr.ip().to_string());
    }

    Cow::Borrowed(UNKNOWN_CLIENT)
}

/// Select the client entry from the `X-Forwarded-For` chain.
///
/// With `hops` trusted proxies, the true client is the entry `hops` from
/// the end: `"client, proxy1, proxy2"` with 2 trusted hops yields `client`.
/// Entries are trimmed; empty entries disqualify the header.
fn forwarded_client_ip<'a, B>(req: &'a Request<B>, hops: usize) -> Option<&'a str> {
    let value = req.headers().get("x-forwarded-for")?.to_str().ok()?;

    let entries: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if entries.is_empty() {
        return None;
    }

    // Chain shorter than the trusted hop count: everything was appended by
    // proxies we trust, so the first entry is the client.
    let index = entries.len().saturating_sub(hops);
    entries.get(index.min(entries.len() - 1)).copied()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_peer(peer: &str) -> Request<Body> {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn test_zero_hops_uses_socket_peer() {
        let req = request_with_peer("203.0.113.50:41234");
        assert_eq!(client_identity(&req, 0), "203.0.113.50");
    }

    #[test]
    fn test_zero_hops_ignores_forwarded_header() {
        let mut req = request_with_peer("203.0.113.50:41234");
        req.headers_mut()
            .insert("x-forwarded-for", "10.9.9.9".parse().unwrap());

        // Spoofed header must not override the socket peer
        assert_eq!(client_identity(&req, 0), "203.0.113.50");
    }

    #[test]
    fn test_one_hop_takes_last_forwarded_entry() {
        let mut req = request_with_peer("10.0.0.1:80");
        req.headers_mut().insert(
            "x-forwarded-for",
            "198.51.100.7, 10.0.0.1".parse().unwrap(),
        );

        // With one trusted hop only the last entry carries trusted
        // information: it is the address that hop actually saw.
        assert_eq!(client_identity(&req, 1), "10.0.0.1");
    }

    #[test]
    fn test_two_hops_reaches_original_client() {
        let mut req = request_with_peer("10.0.0.2:80");
        req.headers_mut().insert(
            "x-forwarded-for",
            "198.51.100.7, 10.0.0.1, 10.0.0.2".parse().unwrap(),
        );

        assert_eq!(client_identity(&req, 2), "10.0.0.1");
        assert_eq!(client_identity(&req, 3), "198.51.100.7");
    }

    #[test]
    fn test_chain_shorter_than_hops_uses_first_entry() {
        let mut req = request_with_peer("10.0.0.1:80");
        req.headers_mut()
            .insert("x-forwarded-for", "198.51.100.7".parse().unwrap());

        assert_eq!(client_identity(&req, 5), "198.51.100.7");
    }

    #[test]
    fn test_hops_without_header_falls_back_to_peer() {
        let req = request_with_peer("203.0.113.50:41234");
        assert_eq!(client_identity(&req, 2), "203.0.113.50");
    }

    #[test]
    fn test_no_peer_no_header_is_unknown() {
        let req = Request::builder().body(Body::empty()).unwrap();
        let identity = client_identity(&req, 0);
        assert_eq!(identity, UNKNOWN_CLIENT);
        assert!(matches!(identity, Cow::Borrowed(_)));
    }

    #[test]
    fn test_whitespace_in_chain_is_trimmed() {
        let mut req = request_with_peer("10.0.0.1:80");
        req.headers_mut().insert(
            "x-forwarded-for",
            "  198.51.100.7 ,  10.0.0.1 ".parse().unwrap(),
        );

        assert_eq!(client_identity(&req, 2), "198.51.100.7");
    }

    #[test]
    fn test_empty_header_falls_back_to_peer() {
        let mut req = request_with_peer("203.0.113.50:41234");
        req.headers_mut()
            .insert("x-forwarded-for", "   ".parse().unwrap());

        assert_eq!(client_identity(&req, 1), "203.0.113.50");
    }
}
