//! In-memory session store.
//!
//! Fallback for when the durable store is unreachable at startup. Expiry and
//! kind gating behave exactly like the Postgres store; sessions simply do
//! not survive a process restart.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    SessionKind, SessionRecord, SessionSnapshot, SessionStore, generate_session_token,
    hash_session_token,
};

struct MemorySession {
    snapshot: SessionSnapshot,
    kind: SessionKind,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    max_age_seconds: i64,
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<Vec<u8>, MemorySession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn create_at(
        &self,
        snapshot: SessionSnapshot,
        kind: SessionKind,
        max_age_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let token = generate_session_token(kind)?;
        let token_hash = hash_session_token(&token);
        let session = MemorySession {
            snapshot,
            kind,
            created_at: now,
            last_seen_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
            max_age_seconds,
        };
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(token_hash, session);
        Ok(token)
    }

    fn load_at(&self, token: &str, now: DateTime<Utc>) -> Option<SessionRecord> {
        let token_hash = hash_session_token(token);
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let expired = entries
            .get(&token_hash)
            .is_some_and(|session| session.expires_at <= now);
        if expired {
            entries.remove(&token_hash);
            return None;
        }
        let session = entries.get_mut(&token_hash)?;
        // Sliding expiry: touching re-arms the clock.
        session.last_seen_at = now;
        session.expires_at = now + Duration::seconds(session.max_age_seconds);
        Some(SessionRecord {
            snapshot: session.snapshot.clone(),
            kind: session.kind,
            created_at: session.created_at,
            last_seen_at: session.last_seen_at,
        })
    }

    fn assume_organization_at(
        &self,
        token: &str,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> bool {
        let token_hash = hash_session_token(token);
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get_mut(&token_hash) {
            Some(session) if session.expires_at > now => {
                session.snapshot.current_organization_id = organization_id;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        snapshot: SessionSnapshot,
        kind: SessionKind,
        max_age_seconds: i64,
    ) -> Result<String> {
        self.create_at(snapshot, kind, max_age_seconds, Utc::now())
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>> {
        Ok(self.load_at(token, Utc::now()))
    }

    async fn destroy(&self, token: &str) -> Result<()> {
        let token_hash = hash_session_token(token);
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(&token_hash);
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid, kind: Option<SessionKind>) -> Result<()> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, session| {
            session.snapshot.user_id != user_id || kind.is_some_and(|k| session.kind != k)
        });
        Ok(())
    }

    async fn assume_organization(&self, token: &str, organization_id: Uuid) -> Result<bool> {
        Ok(self.assume_organization_at(token, organization_id, Utc::now()))
    }
}
