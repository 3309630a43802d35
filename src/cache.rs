//! Short-lived response cache for relayed upstream payloads.
//!
//! # Keying
//!
//! Entries are keyed by request path plus the raw query string, verbatim.
//! Two semantically identical requests whose parameters arrive in a
//! different order therefore occupy distinct entries. This coarseness is
//! intentional and documented; normalizing keys would change which requests
//! share an entry.
//!
//! # Expiry
//!
//! Expiry is passive: an entry's deadline is checked when the entry is read,
//! and an expired entry is removed at that point. There is no background
//! sweeper and no invalidation API. By default the key space is unbounded;
//! setting a maximum entry count enables eviction (expired entries first,
//! then the oldest entry by insertion time). The `proxy_cache_entries`
//! gauge is updated on every insert and removal, passive expiry included.

use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

/// A single cached upstream response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// Relayed body bytes, returned verbatim to clients
    pub body: Bytes,
    /// Content type reported by the upstream, if any
    pub content_type: Option<String>,
    /// The upstream's own HTTP status (informational; clients always see 200)
    pub upstream_status: u16,
    /// When the entry was inserted
    stored_at: Instant,
    /// When the entry stops being served
    expires_at: Instant,
}

impl CachedResponse {
    /// Whether the entry's TTL has fully elapsed.
    ///
    /// Boundary: an entry is expired once the deadline is reached, so a
    /// `now >= expires_at` comparison, matching the countdown reported in
    /// `Cache-Control` headers.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Remaining lifetime, saturating at zero once expired.
    ///
    /// Used for the `Cache-Control: max-age` header, which counts down from
    /// the configured TTL as the entry ages.
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Age of the entry since insertion.
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

/// Thread-safe TTL cache for upstream responses.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
    /// Time-to-live applied to every inserted entry
    ttl: Duration,
    /// Capacity bound; 0 = unbounded
    max_entries: usize,
}

impl ResponseCache {
    /// Create a cache with the given per-entry TTL and capacity bound
    /// (0 = unbounded).
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Derive the cache key for a request: path plus raw query string,
    /// verbatim (no parameter-order normalization).
    pub fn key(path: &str, raw_query: Option<&str>) -> String {
        match raw_query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        }
    }

    /// Look up an unexpired entry.
    ///
    /// An expired entry found under the key is removed here (passive
    /// expiry) and the lookup reports a miss.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(entry.clone());
            }
            // Release the shard read guard before removing
            drop(entry);
            self.entries.remove(key);
            crate::metrics::record_cache_entries(self.entries.len());
        }
        None
    }

    /// Store a relayed response under the key with the configured TTL.
    ///
    /// Only called after a transport-successful upstream reply; transport
    /// failures never populate the cache.
    pub fn insert(&self, key: String, body: Bytes, content_type: Option<String>, status: u16) {
        if self.ttl.is_zero() {
            return;
        }

        if self.max_entries > 0 && self.entries.len() >= self.max_entries {
            self.evict_one();
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            CachedResponse {
                body,
                content_type,
                upstream_status: status,
                stored_at: now,
                expires_at: now + self.ttl,
            },
        );
        crate::metrics::record_cache_entries(self.entries.len());
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make room for one insertion: drop expired entries, and if none were
    /// expired, drop the oldest entry by insertion time.
    fn evict_one(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        if self.entries.len() < before {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn body(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_key_includes_raw_query_verbatim() {
        assert_eq!(ResponseCache::key("/api", Some("q=Boston")), "/api?q=Boston");
        assert_eq!(ResponseCache::key("/api", None), "/api");
        assert_eq!(ResponseCache::key("/api", Some("")), "/api");

        // Parameter order is not normalized: distinct keys
        let a = ResponseCache::key("/api", Some("a=1&b=2"));
        let b = ResponseCache::key("/api", Some("b=2&a=1"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60), 0);
        cache.insert("/api?q=Boston".to_string(), body("{\"temp\":72}"), None, 200);

        let hit = cache.get("/api?q=Boston").unwrap();
        assert_eq!(hit.body, body("{\"temp\":72}"));
        assert_eq!(hit.upstream_status, 200);
        assert!(!hit.is_expired());
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = ResponseCache::new(Duration::from_secs(60), 0);
        assert!(cache.get("/api?q=Boston").is_none());
    }

    #[test]
    fn test_passive_expiry_removes_entry() {
        let cache = ResponseCache::new(Duration::from_millis(30), 0);
        cache.insert("/api?q=Boston".to_string(), body("x"), None, 200);
        assert_eq!(cache.len(), 1);

        sleep(Duration::from_millis(50));

        // The expired entry is dropped on access
        assert!(cache.get("/api?q=Boston").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remaining_ttl_counts_down() {
        let cache = ResponseCache::new(Duration::from_secs(10), 0);
        cache.insert("/api".to_string(), body("x"), None, 200);

        sleep(Duration::from_millis(20));

        let remaining = cache.get("/api").unwrap().remaining_ttl();
        assert!(remaining < Duration::from_secs(10));
        assert!(remaining > Duration::from_secs(9));
    }

    #[test]
    fn test_zero_ttl_disables_storage() {
        let cache = ResponseCache::new(Duration::ZERO, 0);
        cache.insert("/api".to_string(), body("x"), None, 200);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bounded_cache_evicts_oldest() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("/api?q=a".to_string(), body("a"), None, 200);
        sleep(Duration::from_millis(5));
        cache.insert("/api?q=b".to_string(), body("b"), None, 200);
        sleep(Duration::from_millis(5));
        cache.insert("/api?q=c".to_string(), body("c"), None, 200);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("/api?q=a").is_none(), "oldest entry evicted");
        assert!(cache.get("/api?q=b").is_some());
        assert!(cache.get("/api?q=c").is_some());
    }

    #[test]
    fn test_bounded_cache_prefers_purging_expired() {
        let cache = ResponseCache::new(Duration::from_millis(30), 2);
        cache.insert("/api?q=a".to_string(), body("a"), None, 200);

        sleep(Duration::from_millis(50));

        cache.insert("/api?q=b".to_string(), body("b"), None, 200);
        cache.insert("/api?q=c".to_string(), body("c"), None, 200);

        // "a" was expired and purged; both fresh entries remain
        assert!(cache.get("/api?q=b").is_some());
        assert!(cache.get("/api?q=c").is_some());
    }

    #[test]
    fn test_insert_overwrites_existing_key() {
        let cache = ResponseCache::new(Duration::from_secs(60), 0);
        cache.insert("/api".to_string(), body("old"), None, 200);
        cache.insert("/api".to_string(), body("new"), None, 200);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/api").unwrap().body, body("new"));
    }
}
