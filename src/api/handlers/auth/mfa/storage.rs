//! Storage helpers for MFA enrollment state and backup codes.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::MfaState;

/// MFA enrollment data for a user. Absence of a row means unenrolled.
#[derive(Clone, Debug)]
pub(super) struct MfaRecord {
    pub(super) state: MfaState,
    pub(super) secret_ciphertext: Option<Vec<u8>>,
}

/// Load the MFA record for a user.
pub(super) async fn load_mfa(pool: &PgPool, user_id: Uuid) -> Result<Option<MfaRecord>> {
    let query = r"
        SELECT state, secret_ciphertext
        FROM user_mfa
        WHERE user_id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load MFA record")?;
    Ok(row.map(|row| {
        let state_text: String = row.get("state");
        MfaRecord {
            state: MfaState::from_str(&state_text).unwrap_or(MfaState::Disabled),
            secret_ciphertext: row.get("secret_ciphertext"),
        }
    }))
}

/// Start (or restart) enrollment: store the sealed secret in `pending_setup`
/// and replace any previous backup codes, all in one transaction. Returns
/// `false` without touching anything when the user is already enabled.
pub(super) async fn begin_enrollment(
    pool: &PgPool,
    user_id: Uuid,
    secret_ciphertext: &[u8],
    code_hashes: &[String],
) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin enrollment transaction")?;

    // The guard lives in the statement so two racing setups cannot clobber
    // an enrollment that just flipped to enabled.
    let query = r"
        INSERT INTO user_mfa (user_id, state, secret_ciphertext, updated_at)
        VALUES ($1, 'pending_setup', $2, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET state = 'pending_setup',
            secret_ciphertext = $2,
            updated_at = NOW()
        WHERE user_mfa.state <> 'enabled'
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(secret_ciphertext)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to upsert MFA enrollment")?;

    if row.is_none() {
        tx.rollback().await.context("rollback enrollment")?;
        return Ok(false);
    }

    replace_backup_codes_tx(&mut tx, user_id, code_hashes).await?;
    tx.commit().await.context("commit enrollment transaction")?;
    Ok(true)
}

/// Flip `pending_setup` to `enabled`. Returns `false` when no pending
/// enrollment exists, so the transition happens exactly once.
pub(super) async fn mark_enabled(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE user_mfa
        SET state = 'enabled', updated_at = NOW()
        WHERE user_id = $1
          AND state = 'pending_setup'
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to enable MFA")?;
    Ok(row.is_some())
}

/// Clear the secret and every backup code; state becomes `disabled`.
pub(super) async fn clear_enrollment(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await.context("begin disable transaction")?;

    let query = r"
        UPDATE user_mfa
        SET state = 'disabled', secret_ciphertext = NULL, updated_at = NOW()
        WHERE user_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to disable MFA")?;

    sqlx::query("DELETE FROM user_mfa_backup_codes WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete backup codes")?;

    tx.commit().await.context("commit disable transaction")?;
    Ok(())
}

/// List unconsumed backup-code hashes for a user.
pub(super) async fn list_backup_code_hashes(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
    let query = r"
        SELECT code_hash
        FROM user_mfa_backup_codes
        WHERE user_id = $1
          AND consumed_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list backup codes")?;
    Ok(rows
        .into_iter()
        .map(|row| row.get::<String, _>("code_hash"))
        .collect())
}

/// Atomic test-and-consume: two requests racing on the same code get
/// exactly one `true` between them.
pub(super) async fn consume_backup_code_hash(
    pool: &PgPool,
    user_id: Uuid,
    code_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE user_mfa_backup_codes
        SET consumed_at = NOW()
        WHERE user_id = $1
          AND code_hash = $2
          AND consumed_at IS NULL
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(code_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume backup code")?;
    Ok(row.is_some())
}

/// Replace the whole backup-code set in one transaction, so old codes are
/// invalidated with no overlap window.
pub(super) async fn replace_backup_codes(
    pool: &PgPool,
    user_id: Uuid,
    code_hashes: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin regenerate transaction")?;
    replace_backup_codes_tx(&mut tx, user_id, code_hashes).await?;
    tx.commit().await.context("commit regenerate transaction")?;
    Ok(())
}

async fn replace_backup_codes_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    code_hashes: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM user_mfa_backup_codes WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .context("failed to delete old backup codes")?;

    let query = r"
        INSERT INTO user_mfa_backup_codes (user_id, code_hash)
        VALUES ($1, $2)
    ";
    for hash in code_hashes {
        sqlx::query(query)
            .bind(user_id)
            .bind(hash)
            .execute(&mut **tx)
            .await
            .context("failed to insert backup code")?;
    }
    Ok(())
}
