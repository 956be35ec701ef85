//! Authentication providers
//!
//! Providers turn inbound request headers into the current user's email:
//! - Basic: bearer tokens signed with a shared secret (HS256)
//! - External: assertions signed by an identity proxy, verified with keys
//!   fetched from its publication endpoint
//!
//! Basic failures carry the decode reason; external failures are opaque.

mod basic;
mod external;
mod keys;
mod middleware;

pub use basic::BasicAuthProvider;
pub use external::{
    ExternalAuthProvider, ProviderIdentity, DEFAULT_ASSERTION_HEADER, DEFAULT_KEY_URL,
};
pub use keys::{KeyCache, KeyFetchError};
pub use middleware::{bearer_token, extract_bearer, header_value};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Could not validate credentials")]
    CouldNotValidate,

    #[error("Token is missing the '{0}' claim")]
    MissingClaim(String),

    #[error(transparent)]
    KeyFetch(#[from] KeyFetchError),

    #[error("Failed to issue token: {0}")]
    TokenIssue(String),
}

impl AuthError {
    /// HTTP status a caller should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::TokenIssue(_) => 500,
            _ => 401,
        }
    }
}

/// Claims of a token minted by [`issue_token`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mint an HS256 token the Basic provider accepts
pub fn issue_token(
    email: &str,
    secret: &SecretString,
    ttl: chrono::Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let expires = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::TokenIssue(format!("Token lifetime out of range: {}", ttl)))?;
    let claims = TokenClaims {
        email: email.to_string(),
        iat: now.timestamp(),
        exp: expires.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AuthError::TokenIssue(e.to_string()))
}

fn email_claim(claims: &Value) -> Result<String, AuthError> {
    claims
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AuthError::MissingClaim("email".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::CouldNotValidate.status_code(), 401);
        assert_eq!(AuthError::InvalidToken("bad".into()).status_code(), 401);
        assert_eq!(
            AuthError::KeyFetch(KeyFetchError::KeyNotFound("k".into())).status_code(),
            401
        );
        assert_eq!(AuthError::TokenIssue("bad".into()).status_code(), 500);
    }

    #[test]
    fn test_email_claim() {
        let claims = serde_json::json!({"email": "a@x.com"});
        assert_eq!(email_claim(&claims).unwrap(), "a@x.com");

        let claims = serde_json::json!({"email": 42});
        assert!(matches!(email_claim(&claims), Err(AuthError::MissingClaim(_))));
    }

    #[test]
    fn test_issued_token_claims() {
        let secret = SecretString::from("s".to_string());
        let token = issue_token("a@x.com", &secret, chrono::Duration::hours(1)).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_issue_token_rejects_unrepresentable_expiry() {
        let secret = SecretString::from("s".to_string());
        let ttl = chrono::Duration::try_days(365 * 1_000_000).unwrap();
        let result = issue_token("a@x.com", &secret, ttl);
        assert!(matches!(result, Err(AuthError::TokenIssue(_))));
    }
}
