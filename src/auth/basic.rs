//! Shared-secret bearer token provider

use super::middleware::extract_bearer;
use super::{email_claim, AuthError};
use crate::plugins::{AuthenticationProviderPlugin, Plugin};
use async_trait::async_trait;
use http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::warn;

/// Validates HS256 tokens signed with the configured secret
///
/// Decode failures are reported with their reason.
pub struct BasicAuthProvider {
    secret: SecretString,
}

impl BasicAuthProvider {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Decode a token and return its `email` claim
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let no_required: &[&str] = &[];
        validation.set_required_spec_claims(no_required);

        let data = decode::<Value>(token, &key, &validation).map_err(|e| {
            warn!(error = %e, "Rejected bearer token");
            AuthError::InvalidToken(e.to_string())
        })?;

        email_claim(&data.claims)
    }
}

impl Plugin for BasicAuthProvider {
    fn slug(&self) -> &str {
        "beacon-auth-provider-basic"
    }

    fn title(&self) -> &str {
        "Beacon - Basic Authentication Provider"
    }

    fn description(&self) -> Option<&str> {
        Some("Generic basic authentication provider.")
    }
}

#[async_trait]
impl AuthenticationProviderPlugin for BasicAuthProvider {
    async fn get_current_user(&self, headers: &HeaderMap) -> Result<Option<String>, AuthError> {
        match extract_bearer(headers) {
            Some(token) => self.validate(token).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn secret() -> SecretString {
        SecretString::from("test-secret".to_string())
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_valid_bearer_returns_email() {
        let provider = BasicAuthProvider::new(secret());
        let token = issue_token("a@x.com", &secret(), chrono::Duration::minutes(5)).unwrap();

        let user = provider
            .get_current_user(&headers(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(user.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_missing_header_is_none() {
        let provider = BasicAuthProvider::new(secret());
        let user = provider.get_current_user(&HeaderMap::new()).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_none() {
        let provider = BasicAuthProvider::new(secret());
        let user = provider
            .get_current_user(&headers("Basic dXNlcjpwYXNz"))
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_malformed_token_reports_reason() {
        let provider = BasicAuthProvider::new(secret());
        let result = provider.get_current_user(&headers("Bearer not-a-jwt")).await;

        match result {
            Err(AuthError::InvalidToken(reason)) => assert!(!reason.is_empty()),
            other => panic!("Expected InvalidToken, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let provider = BasicAuthProvider::new(secret());
        let other = SecretString::from("other-secret".to_string());
        let token = issue_token("a@x.com", &other, chrono::Duration::minutes(5)).unwrap();

        let result = provider
            .get_current_user(&headers(&format!("Bearer {token}")))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let provider = BasicAuthProvider::new(secret());
        let token = issue_token("a@x.com", &secret(), chrono::Duration::minutes(-10)).unwrap();

        let result = provider.validate(&token);
        match result {
            Err(AuthError::InvalidToken(reason)) => {
                assert!(reason.to_lowercase().contains("expired"))
            }
            other => panic!("Expected InvalidToken, got: {other:?}"),
        }
    }

    #[test]
    fn test_missing_email_claim() {
        let provider = BasicAuthProvider::new(secret());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "svc"}),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let result = provider.validate(&token);
        assert!(matches!(result, Err(AuthError::MissingClaim(claim)) if claim == "email"));
    }
}
