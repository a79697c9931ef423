//! Database helpers for user accounts.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Fields needed to authenticate a user.
pub(super) struct UserRecord {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) password_hash: String,
    pub(super) role: String,
    pub(super) organization_id: Uuid,
    pub(super) status: String,
}

/// Look up login data by normalized username.
pub(super) async fn lookup_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, username, password_hash, role, organization_id, status
        FROM users
        WHERE username = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| UserRecord {
        user_id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        organization_id: row.get("organization_id"),
        status: row.get("status"),
    }))
}
