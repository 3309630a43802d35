//! Outbound HTTP client for the proxied weather API.
//!
//! One inbound request maps to at most one outbound GET: the credential
//! pair comes first, then any query parameters embedded in the configured
//! base URL, then every client-supplied parameter. A parameter from either
//! source sharing the credential's name is dropped, so the
//! server-controlled value always wins and the upstream never sees a
//! duplicate.
//!
//! There are no retries, no fallback endpoints, and no streaming: the reply
//! body is collected and relayed verbatim.

use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// A collected upstream reply.
///
/// Carried back to the forwarding handler regardless of the upstream's own
/// status code; only transport failures surface as errors.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    /// The upstream's HTTP status (relayed to clients as 200 regardless)
    pub status: StatusCode,
    /// Content type reported by the upstream, if any
    pub content_type: Option<String>,
    /// Collected body bytes
    pub body: Bytes,
}

/// Client wrapper holding the credential and connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: Url,
    credential_param: String,
    credential_value: String,
    /// Gate for the credential-bearing URL diagnostic; false in production
    log_outbound_url: bool,
}

impl UpstreamClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the base URL does not parse or
    /// the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> AppResult<Self> {
        let base_url = Url::parse(&config.upstream_base_url).map_err(|e| {
            AppError::ConfigError(format!("UPSTREAM_BASE_URL does not parse: {e}"))
        })?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.upstream_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            credential_param: config.credential_param.clone(),
            credential_value: config.credential_value.clone(),
            log_outbound_url: !config.is_production(),
        })
    }

    /// Construct the outbound URL: credential first, then parameters
    /// embedded in the base URL itself, then client parameters.
    /// Credential-name collisions from either source are dropped.
    fn build_url(&self, client_params: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        let base_params: Vec<(String, String)> = self
            .base_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.append_pair(&self.credential_param, &self.credential_value);
            for (name, value) in base_params.iter().chain(client_params) {
                if name == &self.credential_param {
                    continue;
                }
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Perform the single outbound GET for an inbound request.
    ///
    /// Any HTTP reply from the upstream is a success here; only
    /// transport-level failures (refused connection, DNS, timeout) return
    /// an error, and those are not retried.
    pub async fn fetch(&self, client_params: &[(String, String)]) -> AppResult<UpstreamReply> {
        let url = self.build_url(client_params);

        // The full URL embeds the credential: development-only diagnostic,
        // suppressed in production so shared logs never carry the key.
        if self.log_outbound_url {
            debug!(url = %url, "Outbound upstream request");
        }

        let response = self.http.get(url).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?;

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client() -> UpstreamClient {
        UpstreamClient::new(&Config::default()).unwrap()
    }

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_credential_is_injected_first() {
        let url = client().build_url(&[("q".to_string(), "Boston".to_string())]);

        assert_eq!(
            pairs(&url),
            vec![
                ("key".to_string(), "test-api-key".to_string()),
                ("q".to_string(), "Boston".to_string()),
            ]
        );
    }

    #[test]
    fn test_client_params_preserved_in_order() {
        let url = client().build_url(&[
            ("q".to_string(), "Boston".to_string()),
            ("units".to_string(), "imperial".to_string()),
            ("lang".to_string(), "en".to_string()),
        ]);

        let got = pairs(&url);
        assert_eq!(got.len(), 4);
        assert_eq!(got.get(1).unwrap().0, "q");
        assert_eq!(got.get(2).unwrap().0, "units");
        assert_eq!(got.get(3).unwrap().0, "lang");
    }

    #[test]
    fn test_credential_collision_server_value_wins() {
        let url = client().build_url(&[
            ("key".to_string(), "attacker-supplied".to_string()),
            ("q".to_string(), "Boston".to_string()),
        ]);

        let got = pairs(&url);
        let key_values: Vec<&str> = got
            .iter()
            .filter(|(k, _)| k == "key")
            .map(|(_, v)| v.as_str())
            .collect();

        // Exactly one credential pair, and it is the server's
        assert_eq!(key_values, vec!["test-api-key"]);
    }

    #[test]
    fn test_no_client_params_yields_credential_only() {
        let url = client().build_url(&[]);
        assert_eq!(
            pairs(&url),
            vec![("key".to_string(), "test-api-key".to_string())]
        );
    }

    #[test]
    fn test_base_url_params_survive_credential_injection() {
        let config = Config {
            upstream_base_url: "http://localhost:9100/data?lang=en".to_string(),
            ..Config::default()
        };
        let url = UpstreamClient::new(&config)
            .unwrap()
            .build_url(&[("q".to_string(), "Boston".to_string())]);

        assert_eq!(
            pairs(&url),
            vec![
                ("key".to_string(), "test-api-key".to_string()),
                ("lang".to_string(), "en".to_string()),
                ("q".to_string(), "Boston".to_string()),
            ]
        );
    }

    #[test]
    fn test_base_url_credential_param_is_replaced() {
        let config = Config {
            upstream_base_url: "http://localhost:9100/data?key=stale-key".to_string(),
            ..Config::default()
        };
        let url = UpstreamClient::new(&config).unwrap().build_url(&[]);

        assert_eq!(
            pairs(&url),
            vec![("key".to_string(), "test-api-key".to_string())]
        );
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let url = client().build_url(&[("q".to_string(), "New York".to_string())]);
        assert!(url.as_str().contains("q=New+York"));
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let config = Config {
            upstream_base_url: "http://".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            UpstreamClient::new(&config),
            Err(AppError::ConfigError(_))
        ));
    }
}
