//! Server-authoritative sessions.
//!
//! A session token is an opaque 256-bit random value handed to the client in
//! an `HttpOnly` cookie; only its SHA-256 hash is stored. Expiry is sliding:
//! every authenticated load atomically re-arms `expires_at = now + max_age`,
//! so a session dies `max_age` after its last activity, not after issuance.
//!
//! Session kind is encoded both as a token prefix and as a stored column;
//! the stored `kind` is authoritative, the prefix only aids debugging. MFA
//! challenge sessions can never authenticate normal routes.

pub mod memory;
pub mod postgres;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::api::handlers::auth::role::Role;

/// Prefix for MFA challenge session tokens.
pub const MFA_CHALLENGE_PREFIX: &str = "mfa_challenge_";

/// Session kinds gating what a session may do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionKind {
    /// Full session with normal access.
    Full,
    /// Short-lived session limited to MFA verification after password auth.
    MfaChallenge,
}

impl SessionKind {
    /// Classify a session token by its prefix.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        if token.starts_with(MFA_CHALLENGE_PREFIX) {
            Self::MfaChallenge
        } else {
            Self::Full
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::MfaChallenge => "mfa_challenge",
        }
    }

    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "full" => Some(Self::Full),
            "mfa_challenge" => Some(Self::MfaChallenge),
            _ => None,
        }
    }

    fn token_prefix(self) -> &'static str {
        match self {
            Self::Full => "",
            Self::MfaChallenge => MFA_CHALLENGE_PREFIX,
        }
    }
}

/// Principal data frozen into a session at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub organization_id: Uuid,
    pub current_organization_id: Uuid,
}

/// A live session as returned by `SessionStore::load`.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub snapshot: SessionSnapshot,
    pub kind: SessionKind,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Create a new session token. The raw value is only returned to set the
/// cookie; stores keep a hash.
pub(crate) fn generate_session_token(kind: SessionKind) -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(format!(
        "{}{}",
        kind.token_prefix(),
        URL_SAFE_NO_PAD.encode(bytes)
    ))
}

/// Hash a session token so raw values never touch a store.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Storage contract for sessions.
///
/// The durable implementation is [`postgres::PgSessionStore`]; when the
/// durable store is unavailable at startup, [`memory::MemorySessionStore`]
/// takes over with identical expiry semantics and no durability.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session and return the raw token.
    async fn create(
        &self,
        snapshot: SessionSnapshot,
        kind: SessionKind,
        max_age_seconds: i64,
    ) -> Result<String>;

    /// Resolve a raw token to a live session, atomically touching it
    /// (sliding expiry). Returns `None` for unknown or expired tokens.
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Destroy one session. Idempotent.
    async fn destroy(&self, token: &str) -> Result<()>;

    /// Destroy every session of a user, optionally restricted to one kind.
    async fn destroy_for_user(&self, user_id: Uuid, kind: Option<SessionKind>) -> Result<()>;

    /// Rewrite the acting organization on a live session. Returns `false`
    /// when the session is unknown or expired.
    async fn assume_organization(&self, token: &str, organization_id: Uuid) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::{MFA_CHALLENGE_PREFIX, SessionKind, generate_session_token, hash_session_token};

    #[test]
    fn session_kind_from_token_classifies_prefixes() {
        assert_eq!(
            SessionKind::from_token(&format!("{MFA_CHALLENGE_PREFIX}token")),
            SessionKind::MfaChallenge
        );
        assert_eq!(SessionKind::from_token("plain"), SessionKind::Full);
    }

    #[test]
    fn session_kind_round_trips() {
        assert_eq!(
            SessionKind::from_str(SessionKind::Full.as_str()),
            Some(SessionKind::Full)
        );
        assert_eq!(
            SessionKind::from_str(SessionKind::MfaChallenge.as_str()),
            Some(SessionKind::MfaChallenge)
        );
        assert_eq!(SessionKind::from_str("bogus"), None);
    }

    #[test]
    fn generated_tokens_carry_kind_prefix() {
        let full = generate_session_token(SessionKind::Full).expect("token");
        let challenge = generate_session_token(SessionKind::MfaChallenge).expect("token");
        assert_eq!(SessionKind::from_token(&full), SessionKind::Full);
        assert_eq!(
            SessionKind::from_token(&challenge),
            SessionKind::MfaChallenge
        );
        assert_ne!(full, challenge);
    }

    #[test]
    fn token_hash_is_stable_and_distinct() {
        let first = hash_session_token("token");
        let second = hash_session_token("token");
        let different = hash_session_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }
}
