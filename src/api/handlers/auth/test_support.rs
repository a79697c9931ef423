//! Shared fixtures for auth handler tests.

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::state::{AuthConfig, AuthState};
use crate::{
    audit::AuditLogger, rate_limit::MemoryRateLimitStore, session::memory::MemorySessionStore,
    token::TokenSigner,
};

/// A pool pointed at a closed port: usable for plumbing, fails on use.
pub(crate) fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(1))
        .connect_lazy("postgres://gardisto@127.0.0.1:1/gardisto")
        .expect("lazy pool")
}

pub(crate) fn state_with_config(config: AuthConfig) -> Arc<AuthState> {
    let signer = TokenSigner::new(b"test-signing-secret", 3600);
    Arc::new(AuthState::new(
        config,
        signer,
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryRateLimitStore::new()),
        AuditLogger::new(lazy_pool()),
    ))
}

/// Development-mode state over in-memory stores.
pub(crate) fn test_state() -> Arc<AuthState> {
    state_with_config(AuthConfig::new(false))
}
