//! Configuration system for Beacon
//!
//! Loads configuration from TOML files and environment variables.

mod types;

pub use types::*;

use crate::router::RoutingRule;
use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Environment variable overriding `auth.jwt_secret`
pub const ENV_JWT_SECRET: &str = "BEACON_JWT_SECRET";
/// Environment variable overriding `ui.url`
pub const ENV_UI_URL: &str = "BEACON_UI_URL";
/// Environment variable overriding `storage.path`
pub const ENV_STORAGE_PATH: &str = "BEACON_STORAGE_PATH";

/// Main Beacon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub ui: UiConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    /// Directory plugins resolving service contacts
    pub directories: Vec<DirectoryConfig>,
    /// Routing rules in declaration order
    pub routing: Vec<RoutingRule>,
}

impl Config {
    /// Load configuration from a file, then apply environment overrides
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Load configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Self::from_raw(raw)
    }

    /// Convert from raw TOML config to validated config
    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let ui = raw.ui.unwrap_or_default().into();
        let logging = raw.logging.unwrap_or_default().into();
        let storage = raw.storage.unwrap_or_default().try_into()?;
        let auth = raw.auth.unwrap_or_default().try_into()?;

        let directories = raw
            .directories
            .into_iter()
            .map(|d| d.try_into())
            .collect::<Result<Vec<DirectoryConfig>, _>>()?;

        let mut seen = Vec::new();
        for directory in &directories {
            if seen.contains(&directory.slug.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate directory slug: {}",
                    directory.slug
                )));
            }
            seen.push(directory.slug.as_str());
        }

        let routing = raw.routing.unwrap_or_default().rules;
        for rule in &routing {
            rule.validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        Ok(Self {
            ui,
            logging,
            storage,
            auth,
            directories,
            routing,
        })
    }

    /// Apply `BEACON_*` overrides from `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(ENV_JWT_SECRET).filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(SecretString::from(secret));
        }
        if let Some(url) = lookup(ENV_UI_URL).filter(|s| !s.is_empty()) {
            self.ui.url = url;
        }
        if let Some(path) = lookup(ENV_STORAGE_PATH).filter(|s| !s.is_empty()) {
            self.storage.path = Some(expand_home(&path));
        }
        self
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            directories: vec![],
            routing: vec![],
        }
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("beacon")
            .join("config.toml")
    }

    /// Get the default storage path
    pub fn default_storage_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("beacon")
            .join("individuals.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Expand a leading `~/` to the home directory
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Web UI configuration
#[derive(Debug, Clone)]
pub struct UiConfig {
    /// Base URL ticket weblinks point at
    pub url: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UI_URL.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Format: "json" or "pretty"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format
    Pretty,
    /// JSON format
    Json,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage backend type
    pub backend: StorageBackendType,
    /// Path for file storage
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::File,
            path: None,
        }
    }
}

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendType {
    /// Process-local, lost on exit
    Memory,
    /// JSON file
    File,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Slug of the provider `whoami` runs
    pub provider: String,
    /// Secret for the Basic provider; the provider is only registered when set
    pub jwt_secret: Option<SecretString>,
    pub external: ExternalAuthConfig,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("provider", &self.provider)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("external", &self.external)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_AUTH_PROVIDER.to_string(),
            jwt_secret: None,
            external: ExternalAuthConfig::default(),
        }
    }
}

/// Settings shared by the external assertion providers
#[derive(Debug, Clone)]
pub struct ExternalAuthConfig {
    /// Key publication endpoint
    pub key_url: String,
    /// Header carrying the assertion
    pub header: String,
    pub require_bearer_scheme: bool,
    /// Expected `aud` claim; not checked when unset
    pub audience: Option<String>,
    pub algorithms: Vec<Algorithm>,
    /// Key fetch timeout
    pub timeout: Duration,
}

impl Default for ExternalAuthConfig {
    fn default() -> Self {
        Self {
            key_url: crate::auth::DEFAULT_KEY_URL.to_string(),
            header: crate::auth::DEFAULT_ASSERTION_HEADER.to_string(),
            require_bearer_scheme: false,
            audience: None,
            algorithms: vec![Algorithm::ES256, Algorithm::RS256],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// A configured directory plugin
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Contact type service contacts use to address this directory
    pub slug: String,
    pub title: Option<String>,
    pub source: DirectorySource,
}

/// Where a directory looks contacts up
#[derive(Debug, Clone)]
pub enum DirectorySource {
    /// Fixed external id -> email table
    Static { entries: HashMap<String, String> },
    /// Remote service answering `GET {url}/{external_id}`
    Http { url: String, timeout: Duration },
}

/// Commented configuration written by `beacon init`
pub fn template() -> String {
    format!(
        r#"# Beacon Configuration

[ui]
# Base URL ticket weblinks point at
url = "{ui_url}"

[logging]
level = "info"
format = "pretty"  # or "json"

[storage]
backend = "file"  # or "memory"
# path = "~/.local/share/beacon/individuals.json"

[auth]
# Provider used by `beacon whoami`
provider = "{provider}"
# Secret for the basic provider (or set {env_secret})
# jwt_secret = "change-me"

[auth.external]
key_url = "{key_url}"
header = "{header}"
require_bearer_scheme = false
# audience = "/projects/123/apps/beacon"
algorithms = ["ES256", "RS256"]
timeout_secs = {timeout}

# Directories resolve service contacts into email addresses
# [[directories]]
# slug = "ldap"
# entries = {{ svc42 = "oncall@example.com" }}
#
# [[directories]]
# slug = "okta"
# url = "https://directory.example.com/users"
# timeout_secs = 10

# Routing rules, matched in declaration order on ties
# [[routing.rules]]
# name = "infra-database"
# incident_types = ["infra"]
# incident_priorities = ["P1"]
# keywords = ["database"]
# documents = [{{ name = "DB runbook", weblink = "https://wiki.example.com/db" }}]
# service_contacts = [{{ type = "ldap", external_id = "svc42" }}]
# team_contacts = [{{ name = "SRE", email = "sre@example.com" }}]
"#,
        ui_url = DEFAULT_UI_URL,
        provider = DEFAULT_AUTH_PROVIDER,
        env_secret = ENV_JWT_SECRET,
        key_url = crate::auth::DEFAULT_KEY_URL,
        header = crate::auth::DEFAULT_ASSERTION_HEADER,
        timeout = DEFAULT_TIMEOUT_SECS,
    )
}
