//! Raw configuration types for TOML parsing

use super::*;
use serde::Deserialize;
use std::str::FromStr;

pub const DEFAULT_UI_URL: &str = "http://localhost:8080";
pub const DEFAULT_AUTH_PROVIDER: &str = "beacon-auth-provider-basic";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Raw configuration as parsed from TOML
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub ui: Option<RawUiConfig>,
    pub logging: Option<RawLoggingConfig>,
    pub storage: Option<RawStorageConfig>,
    pub auth: Option<RawAuthConfig>,
    #[serde(default)]
    pub directories: Vec<RawDirectoryConfig>,
    pub routing: Option<RawRoutingConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawUiConfig {
    pub url: Option<String>,
}

impl From<RawUiConfig> for UiConfig {
    fn from(raw: RawUiConfig) -> Self {
        Self {
            url: raw.url.unwrap_or_else(|| DEFAULT_UI_URL.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl From<RawLoggingConfig> for LoggingConfig {
    fn from(raw: RawLoggingConfig) -> Self {
        Self {
            level: raw.level.unwrap_or_else(|| "info".to_string()),
            format: match raw.format.as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawStorageConfig {
    pub backend: Option<String>,
    pub path: Option<String>,
}

impl TryFrom<RawStorageConfig> for StorageConfig {
    type Error = ConfigError;

    fn try_from(raw: RawStorageConfig) -> Result<Self, Self::Error> {
        let backend = match raw.backend.as_deref() {
            Some("file") | None => StorageBackendType::File,
            Some("memory") => StorageBackendType::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown storage backend: {}",
                    other
                )))
            }
        };

        Ok(Self {
            backend,
            path: raw.path.as_deref().map(expand_home),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawAuthConfig {
    pub provider: Option<String>,
    pub jwt_secret: Option<String>,
    pub external: Option<RawExternalAuthConfig>,
}

impl TryFrom<RawAuthConfig> for AuthConfig {
    type Error = ConfigError;

    fn try_from(raw: RawAuthConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            provider: raw
                .provider
                .unwrap_or_else(|| DEFAULT_AUTH_PROVIDER.to_string()),
            jwt_secret: raw
                .jwt_secret
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            external: raw.external.unwrap_or_default().try_into()?,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawExternalAuthConfig {
    pub key_url: Option<String>,
    pub header: Option<String>,
    pub require_bearer_scheme: Option<bool>,
    pub audience: Option<String>,
    pub algorithms: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

impl TryFrom<RawExternalAuthConfig> for ExternalAuthConfig {
    type Error = ConfigError;

    fn try_from(raw: RawExternalAuthConfig) -> Result<Self, Self::Error> {
        let defaults = ExternalAuthConfig::default();

        let algorithms = match raw.algorithms {
            Some(names) => {
                let algorithms = names
                    .iter()
                    .map(|name| {
                        Algorithm::from_str(name).map_err(|_| {
                            ConfigError::Invalid(format!("Unknown algorithm: {}", name))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if algorithms.is_empty() {
                    return Err(ConfigError::Invalid(
                        "auth.external.algorithms must not be empty".to_string(),
                    ));
                }
                algorithms
            }
            None => defaults.algorithms,
        };

        Ok(Self {
            key_url: raw.key_url.unwrap_or(defaults.key_url),
            header: raw.header.unwrap_or(defaults.header),
            require_bearer_scheme: raw.require_bearer_scheme.unwrap_or(false),
            audience: raw.audience.filter(|a| !a.is_empty()),
            algorithms,
            timeout: raw
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawDirectoryConfig {
    pub slug: String,
    pub title: Option<String>,
    pub entries: Option<HashMap<String, String>>,
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl TryFrom<RawDirectoryConfig> for DirectoryConfig {
    type Error = ConfigError;

    fn try_from(raw: RawDirectoryConfig) -> Result<Self, Self::Error> {
        if raw.slug.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Directory slug must not be empty".to_string(),
            ));
        }

        let source = match (raw.entries, raw.url) {
            (Some(entries), None) => DirectorySource::Static { entries },
            (None, Some(url)) => DirectorySource::Http {
                url,
                timeout: Duration::from_secs(raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            },
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(format!(
                    "Directory '{}' has both entries and url",
                    raw.slug
                )))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(format!(
                    "Directory '{}' needs entries or url",
                    raw.slug
                )))
            }
        };

        Ok(Self {
            slug: raw.slug,
            title: raw.title,
            source,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawRoutingConfig {
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}
