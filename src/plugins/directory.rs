//! Directory plugins: resolve a service contact's external id to an email
//!
//! - `StaticDirectoryPlugin` answers from a fixed table (configured inline)
//! - `HttpDirectoryPlugin` asks a remote directory service

use super::{ContactPlugin, Plugin, PluginError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Directory backed by a fixed id -> email table
pub struct StaticDirectoryPlugin {
    slug: String,
    title: String,
    entries: HashMap<String, String>,
}

impl StaticDirectoryPlugin {
    pub fn new(slug: impl Into<String>, entries: HashMap<String, String>) -> Self {
        let slug = slug.into();
        Self {
            title: format!("Static directory ({slug})"),
            slug,
            entries,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        if let Some(title) = title {
            self.title = title;
        }
        self
    }
}

impl Plugin for StaticDirectoryPlugin {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> Option<&str> {
        Some("Resolves contacts from a table in the configuration file.")
    }
}

#[async_trait]
impl ContactPlugin for StaticDirectoryPlugin {
    async fn get(&self, external_id: &str) -> Result<String, PluginError> {
        self.entries
            .get(external_id)
            .cloned()
            .ok_or_else(|| PluginError::ContactNotFound(format!("{}:{}", self.slug, external_id)))
    }
}

/// Directory service response
#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    email: String,
}

/// Directory backed by a remote service
///
/// Looks up `GET {base_url}/{external_id}` and expects `{"email": "..."}`.
pub struct HttpDirectoryPlugin {
    slug: String,
    title: String,
    base_url: Url,
    client: Client,
}

impl HttpDirectoryPlugin {
    pub fn new(
        slug: impl Into<String>,
        base_url: impl AsRef<str>,
        timeout: Duration,
    ) -> Result<Self, PluginError> {
        let slug = slug.into();
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| PluginError::InvalidParams(format!("Invalid directory URL: {}", e)))?;

        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(PluginError::InvalidParams(format!(
                    "URL scheme '{}' not allowed. Only http and https are permitted.",
                    scheme
                )));
            }
        }

        if base_url.cannot_be_a_base() {
            return Err(PluginError::InvalidParams(format!(
                "Directory URL cannot be used as a base: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PluginError::Http(e.to_string()))?;

        Ok(Self {
            title: format!("HTTP directory ({slug})"),
            slug,
            base_url,
            client,
        })
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        if let Some(title) = title {
            self.title = title;
        }
        self
    }

    fn entry_url(&self, external_id: &str) -> Result<Url, PluginError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PluginError::InvalidParams("Directory URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(external_id);
        Ok(url)
    }
}

impl Plugin for HttpDirectoryPlugin {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> Option<&str> {
        Some("Resolves contacts through a remote directory service.")
    }
}

#[async_trait]
impl ContactPlugin for HttpDirectoryPlugin {
    async fn get(&self, external_id: &str) -> Result<String, PluginError> {
        let url = self.entry_url(external_id)?;
        debug!(slug = %self.slug, url = %url, "Looking up contact");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PluginError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(PluginError::ContactNotFound(format!(
                    "{}:{}",
                    self.slug, external_id
                )));
            }
            status => {
                return Err(PluginError::Http(format!(
                    "Directory returned {} for '{}'",
                    status, external_id
                )));
            }
        }

        let entry: DirectoryEntry = response
            .json()
            .await
            .map_err(|e| PluginError::ExecutionFailed(format!("Invalid directory response: {}", e)))?;

        Ok(entry.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn directory(server: &MockServer) -> HttpDirectoryPlugin {
        HttpDirectoryPlugin::new("okta", server.url("/users"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_static_lookup() {
        let entries = [("svc42".to_string(), "a@x.com".to_string())]
            .into_iter()
            .collect();
        let plugin = StaticDirectoryPlugin::new("ldap", entries);

        assert_eq!(plugin.get("svc42").await.unwrap(), "a@x.com");
        assert!(matches!(
            plugin.get("svc43").await,
            Err(PluginError::ContactNotFound(_))
        ));
    }

    #[test]
    fn test_static_title_override() {
        let plugin = StaticDirectoryPlugin::new("ldap", HashMap::new())
            .with_title(Some("Corporate LDAP".to_string()));
        assert_eq!(plugin.title(), "Corporate LDAP");
    }

    #[tokio::test]
    async fn test_http_lookup() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/users/u1");
            then.status(200).json_body(json!({"email": "u1@x.com"}));
        });

        let email = directory(&server).get("u1").await.unwrap();
        assert_eq!(email, "u1@x.com");
        mock.assert();
    }

    #[tokio::test]
    async fn test_http_not_found() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/users/ghost");
            then.status(404);
        });

        let result = directory(&server).get("ghost").await;
        assert!(matches!(result, Err(PluginError::ContactNotFound(_))));
    }

    #[tokio::test]
    async fn test_http_server_error() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/users/u1");
            then.status(500).body("boom");
        });

        let result = directory(&server).get("u1").await;
        assert!(matches!(result, Err(PluginError::Http(_))));
    }

    #[tokio::test]
    async fn test_http_malformed_body() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/users/u1");
            then.status(200).body("not json");
        });

        let result = directory(&server).get("u1").await;
        assert!(matches!(result, Err(PluginError::ExecutionFailed(_))));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = HttpDirectoryPlugin::new("ldap", "ftp://dir.example.com", Duration::from_secs(5));
        assert!(matches!(result, Err(PluginError::InvalidParams(_))));
    }
}
