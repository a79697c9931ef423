//! Durable session store backed by Postgres.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    SessionKind, SessionRecord, SessionSnapshot, SessionStore, generate_session_token,
    hash_session_token,
};
use crate::api::handlers::auth::role::Role;

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        snapshot: SessionSnapshot,
        kind: SessionKind,
        max_age_seconds: i64,
    ) -> Result<String> {
        let query = r"
            INSERT INTO user_sessions
                (session_hash, user_id, username, role, organization_id,
                 current_organization_id, kind, max_age_seconds, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW() + ($8 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        // Hash collisions are astronomically unlikely; retry anyway so a
        // duplicate insert can never surface to the caller.
        for _ in 0..3 {
            let token = generate_session_token(kind)?;
            let token_hash = hash_session_token(&token);
            let result = sqlx::query(query)
                .bind(&token_hash)
                .bind(snapshot.user_id)
                .bind(&snapshot.username)
                .bind(snapshot.role.as_str())
                .bind(snapshot.organization_id)
                .bind(snapshot.current_organization_id)
                .bind(kind.as_str())
                .bind(max_age_seconds)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert session"),
            }
        }

        Err(anyhow!("failed to generate unique session token"))
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>> {
        let token_hash = hash_session_token(token);
        // Lookup and touch are one statement: expiry slides on every load,
        // and an expired row can never be returned or revived.
        let query = r"
            UPDATE user_sessions
            SET last_seen_at = NOW(),
                expires_at = NOW() + (max_age_seconds * INTERVAL '1 second')
            WHERE session_hash = $1
              AND expires_at > NOW()
            RETURNING user_id, username, role, organization_id,
                      current_organization_id, kind, created_at, last_seen_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load session")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role_text: String = row.get("role");
        let role = Role::parse(&role_text)
            .ok_or_else(|| anyhow!("session row carries unknown role: {role_text}"))?;
        let kind_text: String = row.get("kind");
        let kind = SessionKind::from_str(&kind_text)
            .ok_or_else(|| anyhow!("session row carries unknown kind: {kind_text}"))?;

        Ok(Some(SessionRecord {
            snapshot: SessionSnapshot {
                user_id: row.get("user_id"),
                username: row.get("username"),
                role,
                organization_id: row.get("organization_id"),
                current_organization_id: row.get("current_organization_id"),
            },
            kind,
            created_at: row.get("created_at"),
            last_seen_at: row.get("last_seen_at"),
        }))
    }

    async fn destroy(&self, token: &str) -> Result<()> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let token_hash = hash_session_token(token);
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid, kind: Option<SessionKind>) -> Result<()> {
        let query = r"
            DELETE FROM user_sessions
            WHERE user_id = $1
              AND ($2::text IS NULL OR kind = $2)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(kind.map(SessionKind::as_str))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete user sessions")?;
        Ok(())
    }

    async fn assume_organization(&self, token: &str, organization_id: Uuid) -> Result<bool> {
        let token_hash = hash_session_token(token);
        let query = r"
            UPDATE user_sessions
            SET current_organization_id = $2
            WHERE session_hash = $1
              AND expires_at > NOW()
            RETURNING user_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update session organization")?;
        Ok(row.is_some())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_unique_violation;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }
}
