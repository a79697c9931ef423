//! Append-only audit logging for privileged actions.
//!
//! Entries are inserted into `audit_log` and never updated or deleted; the
//! only surface is `log`. A failing sink must not block the action being
//! audited, so persistence errors divert the serialized entry to the
//! process log under the `audit` target — operators keep visibility into
//! the gap even when the primary sink is down.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{Instrument, error};
use uuid::Uuid;

/// One immutable audit record. Timestamps are assigned by the sink.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: &str, entity_type: &str) -> Self {
        Self {
            actor_user_id: None,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: None,
            details: Value::Null,
            ip_address: None,
            user_agent: None,
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor_user_id: Uuid) -> Self {
        self.actor_user_id = Some(actor_user_id);
        self
    }

    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl ToString) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    pool: PgPool,
}

impl AuditLogger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an entry. Never fails and never blocks the audited action:
    /// when the sink is down the entry lands on the process log instead.
    pub async fn log(&self, entry: AuditEntry) {
        if let Err(err) = self.insert(&entry).await {
            let payload =
                serde_json::to_string(&entry).unwrap_or_else(|_| format!("{entry:?}"));
            error!(
                target: "audit",
                entry = %payload,
                "audit sink unavailable, entry diverted to process log: {err}"
            );
        }
    }

    async fn insert(&self, entry: &AuditEntry) -> Result<()> {
        let query = r"
            INSERT INTO audit_log
                (actor_user_id, action, entity_type, entity_id, details,
                 ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5::jsonb, $6, $7)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let details =
            serde_json::to_string(&entry.details).context("failed to serialize audit details")?;
        sqlx::query(query)
            .bind(entry.actor_user_id)
            .bind(&entry.action)
            .bind(&entry.entity_type)
            .bind(&entry.entity_id)
            .bind(details)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert audit entry")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditEntry, AuditLogger};
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    #[test]
    fn builder_fills_all_fields() {
        let actor = Uuid::new_v4();
        let entry = AuditEntry::new("login_success", "user")
            .with_actor(actor)
            .with_entity_id(actor)
            .with_details(json!({"username": "ade"}))
            .with_ip(Some("1.2.3.4".to_string()))
            .with_user_agent(Some("tests".to_string()));

        assert_eq!(entry.actor_user_id, Some(actor));
        assert_eq!(entry.action, "login_success");
        assert_eq!(entry.entity_type, "user");
        assert_eq!(entry.entity_id, Some(actor.to_string()));
        assert_eq!(entry.details["username"], "ade");
        assert_eq!(entry.ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn entry_serializes_for_the_fallback_channel() {
        let entry = AuditEntry::new("mfa_enabled", "user").with_details(json!({"method": "totp"}));
        let payload = serde_json::to_string(&entry).expect("serialize");
        assert!(payload.contains("mfa_enabled"));
        assert!(payload.contains("totp"));
        // Secrets never enter details by contract; the serialized form is
        // exactly what would land on the process log.
        assert!(!payload.contains("secret"));
    }

    #[tokio::test]
    async fn sink_failure_does_not_propagate() {
        // A pool pointed at a closed port: every insert fails, log() must
        // still return without error.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(1))
            .connect_lazy("postgres://gardisto@127.0.0.1:1/gardisto")
            .expect("lazy pool");
        let logger = AuditLogger::new(pool);
        logger.log(AuditEntry::new("logout", "user")).await;
    }
}
