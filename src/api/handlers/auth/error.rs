//! Authentication and authorization error taxonomy.
//!
//! Credential and RBAC failures are terminal and deliberately vague: a
//! response never reveals whether a username exists, which credential half
//! was wrong, or whether MFA is enabled for the account. `RateLimited` is
//! the only class a client is expected to retry, honoring `Retry-After`.

use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permissions")]
    InsufficientPermissions,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("MFA verification required")]
    MfaRequired,

    #[error("invalid MFA code")]
    MfaInvalidCode,

    #[error("MFA is already enabled")]
    AlreadyEnabled,

    #[error("token has expired")]
    TokenExpired,

    #[error("malformed token")]
    TokenMalformed,

    #[error("rate limited")]
    RateLimited { retry_after_seconds: u64 },

    #[error("backing store unavailable")]
    StoreUnavailable,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated
            | Self::InvalidCredentials
            | Self::MfaRequired
            | Self::MfaInvalidCode
            | Self::TokenExpired
            | Self::TokenMalformed => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::AlreadyEnabled => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let mut response = (status, message).into_response();
        if let Self::RateLimited {
            retry_after_seconds,
        } = self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;
    use axum::http::{StatusCode, header::RETRY_AFTER};
    use axum::response::IntoResponse;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AuthError::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::AlreadyEnabled.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::RateLimited {
                retry_after_seconds: 1
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::StoreUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn credential_failures_share_one_message() {
        // Unknown user and wrong password must be indistinguishable.
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = AuthError::RateLimited {
            retry_after_seconds: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }
}
