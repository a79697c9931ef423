use crate::{
    api::handlers::{auth, health},
    audit::AuditLogger,
    rate_limit::{self, MemoryRateLimitStore, RateLimitStore},
    session::{SessionStore, memory::MemorySessionStore, postgres::PgSessionStore},
    token::TokenSigner,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
};
use sqlx::{Connection, PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the API router with every documented route registered.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/session", get(auth::session))
        .route(
            "/v1/auth/assume-organization",
            post(auth::assume_organization),
        )
        .route("/v1/auth/mfa/setup", post(auth::mfa::setup))
        .route("/v1/auth/mfa/verify-setup", post(auth::mfa::verify_setup))
        .route("/v1/auth/mfa/verify", post(auth::mfa::verify))
        .route("/v1/auth/mfa/disable", post(auth::mfa::disable))
        .route(
            "/v1/auth/mfa/backup-codes/regenerate",
            post(auth::mfa::regenerate_backup_codes),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: auth::AuthConfig,
    signer: TokenSigner,
) -> Result<()> {
    // Lazy connect: an unreachable database selects the session fallback
    // below instead of refusing to start.
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect_lazy(&dsn)
        .context("Invalid database connection string")?;

    let sessions: Arc<dyn SessionStore> = match ping(&pool).await {
        Ok(()) => {
            info!("Durable session store selected");
            Arc::new(PgSessionStore::new(pool.clone()))
        }
        Err(err) => {
            // Integrity and expiry enforcement stay identical; only
            // durability is lost until the next restart with a healthy store.
            warn!(
                "DURABLE SESSION STORE UNAVAILABLE ({err}); falling back to the \
                 in-memory session store. Sessions will not survive a restart."
            );
            Arc::new(MemorySessionStore::new())
        }
    };

    let limiter: Arc<dyn RateLimitStore> = Arc::new(MemoryRateLimitStore::new());
    rate_limit::spawn_sweeper(
        Arc::clone(&limiter),
        rate_limit::SWEEP_INTERVAL,
        rate_limit::IDLE_PURGE_AFTER,
    );

    let audit = AuditLogger::new(pool.clone());
    let auth_state = Arc::new(auth::AuthState::new(
        auth_config,
        signer,
        sessions,
        limiter,
        audit,
    ));

    let app = router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(auth_state))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

async fn ping(pool: &PgPool) -> Result<()> {
    let mut conn = tokio::time::timeout(Duration::from_secs(5), pool.acquire())
        .await
        .context("timed out acquiring a database connection")?
        .context("failed to acquire a database connection")?;
    conn.ping().await.context("failed to ping database")?;
    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds() {
        let _router = router();
    }

    #[test]
    fn make_span_picks_up_request_id() {
        let request = Request::builder()
            .uri("/v1/auth/login")
            .header("x-request-id", "01J0000000000000000000000")
            .body(Body::empty())
            .expect("request");
        let _span = make_span(&request);
    }

    #[tokio::test]
    async fn ping_fails_fast_against_a_closed_port() {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy("postgres://gardisto@127.0.0.1:1/gardisto")
            .expect("lazy pool");
        assert!(ping(&pool).await.is_err());
    }
}
