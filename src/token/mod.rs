//! Signed bearer token issuance and verification.
//!
//! Tokens are stateless HS256 JWTs for non-browser clients. There is no
//! server-side blacklist: a token stays valid until it expires or the
//! signing secret is rotated. Sessions remain the primary, revocable
//! mechanism; verification here checks signature, issuer, and expiry only.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::api::handlers::auth::role::Role;

const TOKEN_ISSUER: &str = "gardisto";

/// Claims embedded in every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user ID (UUID string).
    pub sub: String,
    /// Username at issuance time.
    pub username: String,
    /// Role at issuance time.
    pub role: Role,
    /// Home organization ID (UUID string).
    pub org: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Issues and verifies bearer tokens with a symmetric signing secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a signed token for an authenticated user.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        organization_id: Uuid,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            org: organization_id.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
            jti: Uuid::new_v4().to_string(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String> {
        let header = Header::new(Algorithm::HS256);
        jsonwebtoken::encode(&header, claims, &self.encoding).context("failed to encode token")
    }

    /// Decode and verify a token: signature, issuer, and expiry only.
    ///
    /// # Errors
    /// `TokenError::Expired` past the expiration claim, `TokenError::Malformed`
    /// for every other defect (bad signature, wrong issuer, garbage input).
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}
