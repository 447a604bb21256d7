//! Authentication module
//!
//! Bearer-token extraction and JWT validation. A validated token yields the
//! [`Principal`] whose UUID is compared against a video's owner.

use async_trait::async_trait;
use hyper::header::{HeaderMap, AUTHORIZATION};
use thiserror::Error;
use uuid::Uuid;

pub mod jwt;

pub use jwt::JwtAuthenticator;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Malformed authorization header")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),
}

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingAuth)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingAuth);
    }
    Ok(token)
}

/// Authenticator trait
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate a raw token
    async fn validate_token(&self, token: &str) -> Result<Principal, AuthError>;

    /// Authenticate a request by its headers
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = extract_bearer_token(headers)?;
        self.validate_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(extract_bearer_token(&headers("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_extract_bearer_token_failures() {
        assert!(matches!(
            extract_bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuth)
        ));
        assert!(matches!(
            extract_bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            extract_bearer_token(&headers("Bearer")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            extract_bearer_token(&headers("Bearer   ")),
            Err(AuthError::MissingAuth)
        ));
    }
}
