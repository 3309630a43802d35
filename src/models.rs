//! Response bodies for the service's own endpoints.
//!
//! The `/api` route relays upstream bytes verbatim and has no model here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of the `/health` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process is serving
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Entries currently held by the response cache
    pub cache_entries: usize,
    /// Server time of the check
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serializes() {
        let body = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            uptime_seconds: 42,
            cache_entries: 3,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json.get("status").unwrap(), "healthy");
        assert_eq!(json.get("cache_entries").unwrap(), 3);
    }
}
