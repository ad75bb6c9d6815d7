//! Server authenticators and the middleware that enforces them.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Reasons a request is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("missing authorization header")]
    MissingCredentials,
    /// Header present but not in a scheme this authenticator understands.
    #[error("unsupported authorization scheme")]
    UnsupportedScheme,
    /// Credentials did not match.
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Validates incoming HTTP requests.
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Checks the request headers.
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError>;
}

/// Accepts requests carrying `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerTokenAuthenticator {
    token: String,
}

impl BearerTokenAuthenticator {
    /// Creates an authenticator for a fixed token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Creates an authenticator with a freshly generated token.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(generate_token())
    }

    /// Returns the expected token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for BearerTokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenAuthenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::InvalidCredentials)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::UnsupportedScheme)?
            .trim();

        if token.as_bytes().ct_eq(self.token.as_bytes()).into() {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Generates a random bearer token.
#[must_use]
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Middleware that rejects requests the authenticator does not accept.
pub async fn require_auth(
    State(authenticator): State<Arc<dyn Authenticator>>,
    request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), "rejected request: {}", e);
            (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, "Bearer")]).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        // Tokens should be valid UUIDs
        assert_eq!(token1.len(), 36);
        assert_eq!(token2.len(), 36);

        // Tokens should be unique
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_bearer_accepts_matching_token() {
        let auth = BearerTokenAuthenticator::new("s3cret");
        assert_eq!(auth.authenticate(&headers_with("Bearer s3cret")), Ok(()));
    }

    #[test]
    fn test_bearer_rejections() {
        let auth = BearerTokenAuthenticator::new("s3cret");
        assert_eq!(
            auth.authenticate(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            auth.authenticate(&headers_with("Basic dXNlcjpwYXNz")),
            Err(AuthError::UnsupportedScheme)
        );
        assert_eq!(
            auth.authenticate(&headers_with("Bearer s3cre")),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let auth = BearerTokenAuthenticator::new("s3cret");
        assert!(!format!("{:?}", auth).contains("s3cret"));
    }

    #[test]
    fn test_bearer_rejects_near_misses() {
        let auth = BearerTokenAuthenticator::new("abc");
        assert_eq!(auth.authenticate(&headers_with("Bearer abc")), Ok(()));
        for token in ["abd", "abcd", "ab", "ABC"] {
            assert_eq!(
                auth.authenticate(&headers_with(&format!("Bearer {}", token))),
                Err(AuthError::InvalidCredentials),
                "token {:?} was accepted",
                token
            );
        }
    }
}
