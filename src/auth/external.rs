//! Externally issued assertion provider
//!
//! Validates signed assertions placed in a request header by an identity
//! proxy. Verification keys come from the provider's key publication
//! endpoint through a [`KeyCache`]. Every validation failure is reported
//! with the same opaque message.

use super::keys::KeyCache;
use super::middleware::{bearer_token, header_value};
use super::{email_claim, AuthError};
use crate::config::ExternalAuthConfig;
use crate::plugins::{AuthenticationProviderPlugin, Plugin};
use async_trait::async_trait;
use http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_ASSERTION_HEADER: &str = "x-goog-iap-jwt-assertion";
pub const DEFAULT_KEY_URL: &str = "https://www.gstatic.com/iap/verify/public_key";

/// Name and metadata an external provider is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub slug: String,
    pub title: String,
    pub description: String,
}

impl ProviderIdentity {
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn pkce() -> Self {
        Self::new(
            "beacon-auth-provider-pkce",
            "Beacon - PKCE Authentication Provider",
            "Generic PKCE authentication provider.",
        )
    }

    pub fn iap() -> Self {
        Self::new(
            "beacon-auth-provider-iap",
            "Beacon - Identity-Aware Proxy Authentication Provider",
            "Identity-Aware Proxy authentication provider.",
        )
    }
}

/// Validates assertions signed by an external identity provider
pub struct ExternalAuthProvider {
    identity: ProviderIdentity,
    header: String,
    require_bearer_scheme: bool,
    audience: Option<String>,
    algorithms: Vec<Algorithm>,
    keys: KeyCache,
}

impl ExternalAuthProvider {
    pub fn new(identity: ProviderIdentity, keys: KeyCache) -> Self {
        Self {
            identity,
            header: DEFAULT_ASSERTION_HEADER.to_string(),
            require_bearer_scheme: false,
            audience: None,
            algorithms: vec![Algorithm::ES256, Algorithm::RS256],
            keys,
        }
    }

    pub fn from_config(
        identity: ProviderIdentity,
        config: &ExternalAuthConfig,
    ) -> Result<Self, AuthError> {
        let keys = KeyCache::new(config.key_url.clone(), config.timeout)?;
        Ok(Self::new(identity, keys)
            .with_header(config.header.clone())
            .with_bearer_scheme(config.require_bearer_scheme)
            .with_audience(config.audience.clone())
            .with_algorithms(config.algorithms.clone()))
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into().to_ascii_lowercase();
        self
    }

    /// Require the header value to carry a `Bearer` scheme
    pub fn with_bearer_scheme(mut self, required: bool) -> Self {
        self.require_bearer_scheme = required;
        self
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Pull the assertion out of the configured header
    fn extract<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let value = header_value(headers, &self.header)?;
        if self.require_bearer_scheme {
            bearer_token(value)
        } else {
            Some(bearer_token(value).unwrap_or(value))
        }
    }

    /// Verify an assertion and return its `email` claim
    pub async fn validate(&self, token: &str) -> Result<String, AuthError> {
        let header = decode_header(token).map_err(|e| self.reject(e))?;

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| self.reject("assertion header has no kid"))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(self.reject(format!("algorithm {:?} not allowed", header.alg)));
        }

        let pem = self.keys.get(kid).await?;
        let key = decoding_key(header.alg, &pem).map_err(|e| self.reject(e))?;

        // Only the header's algorithm; mixed key families fail validation
        let mut validation = Validation::new(header.alg);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        let no_required: &[&str] = &[];
        validation.set_required_spec_claims(no_required);

        let data = decode::<Value>(token, &key, &validation).map_err(|e| self.reject(e))?;
        debug!(provider = %self.identity.slug, kid = %kid, "Validated assertion");

        email_claim(&data.claims)
    }

    fn reject(&self, reason: impl std::fmt::Display) -> AuthError {
        warn!(
            provider = %self.identity.slug,
            key_url = %self.keys.url(),
            reason = %reason,
            "Rejected assertion"
        );
        AuthError::CouldNotValidate
    }
}

fn decoding_key(alg: Algorithm, pem: &str) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
    match alg {
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
        _ => DecodingKey::from_rsa_pem(pem.as_bytes()),
    }
}

impl Plugin for ExternalAuthProvider {
    fn slug(&self) -> &str {
        &self.identity.slug
    }

    fn title(&self) -> &str {
        &self.identity.title
    }

    fn description(&self) -> Option<&str> {
        Some(&self.identity.description)
    }
}

#[async_trait]
impl AuthenticationProviderPlugin for ExternalAuthProvider {
    async fn get_current_user(&self, headers: &HeaderMap) -> Result<Option<String>, AuthError> {
        match self.extract(headers) {
            Some(token) => self.validate(token).await.map(Some),
            None => Ok(None),
        }
    }
}
