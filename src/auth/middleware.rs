//! Credential extraction from request headers
//!
//! Extraction never fails: an absent or unusable header is reported as
//! `None` and the provider decides what that means.

use http::HeaderMap;

/// Read a header as UTF-8 text, ignoring empty values
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Extract the token from a `Bearer <token>` value
///
/// The scheme is matched case-insensitively; any other scheme yields `None`.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

/// Extract a bearer token from the `Authorization` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, http::header::AUTHORIZATION.as_str()).and_then(bearer_token)
}
