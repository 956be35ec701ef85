//! Verification key cache
//!
//! Keys are fetched from a publication endpoint returning `{ "<kid>": "<pem>" }`.
//! The cache is only refreshed on a miss: an unknown kid triggers exactly one
//! re-fetch, which replaces the whole cache.

use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Key fetch errors
#[derive(Error, Debug)]
pub enum KeyFetchError {
    #[error("Key endpoint request failed: {0}")]
    Request(String),

    #[error("Unable to fetch keys: {status} / {body}")]
    Status { status: u16, body: String },

    #[error("Invalid key endpoint response: {0}")]
    Parse(String),

    #[error("No key published for kid '{0}'")]
    KeyNotFound(String),
}

/// Cache of PEM-encoded verification keys by key id
pub struct KeyCache {
    url: String,
    client: Client,
    keys: RwLock<HashMap<String, String>>,
}

impl KeyCache {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeyFetchError> {
        let client = Client::builder()
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| KeyFetchError::Request(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
            keys: RwLock::new(HashMap::new()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the key for `kid`, re-fetching once if it is not cached
    pub async fn get(&self, kid: &str) -> Result<String, KeyFetchError> {
        let cached = self.keys.read().get(kid).cloned();
        if let Some(key) = cached {
            return Ok(key);
        }

        debug!(kid = %kid, "Key not cached, refreshing");
        let keys = self.fetch().await?;
        let found = keys.get(kid).cloned();
        *self.keys.write() = keys;

        found.ok_or_else(|| KeyFetchError::KeyNotFound(kid.to_string()))
    }

    /// Fetch the published key set without touching the cache
    pub async fn fetch(&self) -> Result<HashMap<String, String>, KeyFetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeyFetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeyFetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let keys: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| KeyFetchError::Parse(e.to_string()))?;

        info!(url = %self.url, keys = keys.len(), "Fetched verification keys");
        Ok(keys)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.read().contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn cache(server: &MockServer) -> KeyCache {
        KeyCache::new(server.url("/keys"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_miss_fetches_then_hits() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).json_body(json!({"k1": "pem-1", "k2": "pem-2"}));
        });

        let cache = cache(&server);
        assert!(cache.is_empty());

        assert_eq!(cache.get("k1").await.unwrap(), "pem-1");
        assert_eq!(cache.get("k2").await.unwrap(), "pem-2");
        assert_eq!(cache.len(), 2);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches_exactly_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).json_body(json!({"k1": "pem-1"}));
        });

        let cache = cache(&server);
        let result = cache.get("k9").await;

        assert!(matches!(result, Err(KeyFetchError::KeyNotFound(kid)) if kid == "k9"));
        assert!(cache.contains("k1"));
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let server = MockServer::start();
        let mut first = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).json_body(json!({"old": "pem-old"}));
        });

        let cache = cache(&server);
        cache.get("old").await.unwrap();
        first.delete();

        let _mock = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).json_body(json!({"new": "pem-new"}));
        });

        assert_eq!(cache.get("new").await.unwrap(), "pem-new");
        assert!(!cache.contains("old"));
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(503).body("unavailable");
        });

        let result = cache(&server).get("k1").await;
        match result {
            Err(KeyFetchError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("Expected Status error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).body("[1, 2, 3]");
        });

        let result = cache(&server).get("k1").await;
        assert!(matches!(result, Err(KeyFetchError::Parse(_))));
    }
}
