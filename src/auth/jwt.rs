//! JWT Authentication
//!
//! HS256 tokens signed with the shared `auth.jwt_secret`. The `sub` claim
//! must be the caller's user UUID.

use super::{AuthError, Authenticator, Principal};
use crate::config::AuthConfig;
use crate::metrics;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub iss: Option<String>,
}

/// JWT Authenticator
///
/// # Example
///
/// ```
/// use tsukumo::auth::jwt::JwtAuthenticator;
///
/// let auth = JwtAuthenticator::new_hs256("my-secret");
///
/// // With issuer validation
/// let auth = JwtAuthenticator::new_hs256("my-secret").with_issuer("tsukumo");
/// ```
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Create a new JWT authenticator with a secret key (HS256)
    pub fn new_hs256(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let auth = Self::new_hs256(&config.jwt_secret);
        match &config.issuer {
            Some(issuer) => auth.with_issuer(issuer),
            None => auth,
        }
    }

    /// Set the required issuer (`iss` claim)
    ///
    /// Tokens without this issuer will be rejected.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    fn decode(&self, token: &str) -> Result<Principal, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        let user_id = Uuid::parse_str(&token_data.claims.sub)
            .map_err(|_| AuthError::InvalidSubject(token_data.claims.sub.clone()))?;
        Ok(Principal { user_id })
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    #[tracing::instrument(name = "auth.jwt", skip_all, fields(auth.method = "jwt"), err)]
    async fn validate_token(&self, token: &str) -> Result<Principal, AuthError> {
        let result = self.decode(token);
        metrics::record_auth_attempt("jwt", result.is_ok());

        let principal = result?;
        tracing::debug!(user_id = %principal.user_id, "JWT authentication successful");
        Ok(principal)
    }
}
