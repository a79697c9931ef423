//! Authentication endpoints and the auth domain model.
//!
//! Flow Overview: login verifies credentials under the auth rate-limit
//! policy, then either issues full credentials (session cookie + bearer
//! token) or, when MFA is enabled, a short-lived challenge session that
//! only the MFA verify endpoint can upgrade. Logout destroys the session
//! idempotently. Organization switching is an explicit, audited operation
//! on the live session row, never an ambient field write.

pub(crate) mod error;
pub(crate) mod mfa;
mod password;
pub(crate) mod principal;
pub(crate) mod role;
pub(crate) mod state;
mod storage;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod types;
pub(crate) mod utils;

pub use error::AuthError;
pub use principal::{Principal, authorize, authorize_any, authorize_super_or_org_admin};
pub use role::Role;
pub use state::{AuthConfig, AuthState};

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::session::{SessionKind, SessionSnapshot};
use principal::{require_auth, require_session_auth};
use types::{AssumeOrganizationRequest, LoginRequest, LoginResponse, PrincipalResponse};
use utils::{
    clear_session_cookie, extract_client_ip, extract_cookie_token, normalize_username,
    rate_limited_response, session_cookie, valid_username, with_rate_limit_headers,
};

fn principal_response(principal: &Principal) -> PrincipalResponse {
    PrincipalResponse {
        user_id: principal.user_id.to_string(),
        username: principal.username.clone(),
        role: principal.role,
        organization_id: principal.organization_id.to_string(),
        current_organization_id: principal.current_organization_id.to_string(),
    }
}

fn request_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Authenticate with username and password.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, or MFA challenge issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Backing store unavailable")
    ),
    tag = "auth"
)]
#[allow(clippy::too_many_lines)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> axum::response::Response {
    // Rate-limit before any lookup so abuse stays cheap to reject.
    let client_ip = extract_client_ip(&headers);
    let policy = auth_state.config().auth_policy();
    let subject = client_ip.clone().unwrap_or_else(|| "unknown".to_string());
    let decision = auth_state.limiter().check(&policy.key(&subject), &policy);
    if !decision.allowed {
        return rate_limited_response(&decision);
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let username = normalize_username(&request.username);
    let user = if valid_username(&username) {
        match storage::lookup_user_by_username(&pool, &username).await {
            Ok(user) => user,
            Err(err) => {
                error!("Login lookup failed: {err}");
                return AuthError::StoreUnavailable.into_response();
            }
        }
    } else {
        None
    };

    // The password check runs for unknown users too, against a dummy hash,
    // so response timing never separates "no such user" from "wrong
    // password". Inactive accounts fail the same way.
    let password_ok =
        password::check_credentials(user.as_ref().map(|u| u.password_hash.as_str()), &request.password);
    let user = user.filter(|u| password_ok && u.status == "active");

    let Some(user) = user else {
        auth_state
            .audit()
            .log(
                AuditEntry::new("login_failed", "user")
                    .with_details(serde_json::json!({ "username": username }))
                    .with_ip(client_ip)
                    .with_user_agent(request_user_agent(&headers)),
            )
            .await;
        let response = AuthError::InvalidCredentials.into_response();
        return with_rate_limit_headers(response, &decision);
    };

    let Some(role) = Role::parse(&user.role) else {
        error!(username = %user.username, "User row carries unknown role: {}", user.role);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let snapshot = SessionSnapshot {
        user_id: user.user_id,
        username: user.username.clone(),
        role,
        organization_id: user.organization_id,
        current_organization_id: user.organization_id,
    };

    let mfa_enabled = match mfa::is_enabled(&pool, user.user_id).await {
        Ok(enabled) => enabled,
        Err(err) => {
            error!("Failed to load MFA state during login: {err}");
            return AuthError::StoreUnavailable.into_response();
        }
    };

    // MFA checkpoint: a challenge session instead of credentials. The
    // response body says nothing more than "mfa_required" — enablement is
    // only revealed after the password already verified.
    if mfa_enabled {
        let ttl = auth_state.config().challenge_ttl_seconds();
        let token = match auth_state
            .sessions()
            .create(snapshot, SessionKind::MfaChallenge, ttl)
            .await
        {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to create MFA challenge session: {err}");
                return AuthError::StoreUnavailable.into_response();
            }
        };
        let cookie = match session_cookie(auth_state.config(), &token, ttl) {
            Ok(cookie) => cookie,
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        auth_state
            .audit()
            .log(
                AuditEntry::new("login_mfa_challenge", "user")
                    .with_actor(user.user_id)
                    .with_entity_id(user.user_id)
                    .with_ip(client_ip)
                    .with_user_agent(request_user_agent(&headers)),
            )
            .await;

        let mut response_headers = HeaderMap::new();
        response_headers.insert(SET_COOKIE, cookie);
        let response = (
            StatusCode::OK,
            response_headers,
            Json(LoginResponse {
                mfa_required: true,
                token: None,
                expires_in: None,
                principal: None,
            }),
        )
            .into_response();
        return with_rate_limit_headers(response, &decision);
    }

    let max_age = auth_state.config().session_max_age_seconds();
    let session_token = match auth_state
        .sessions()
        .create(snapshot.clone(), SessionKind::Full, max_age)
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err}");
            return AuthError::StoreUnavailable.into_response();
        }
    };
    let cookie = match session_cookie(auth_state.config(), &session_token, max_age) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let bearer = match auth_state.signer().issue(
        user.user_id,
        &user.username,
        role,
        user.organization_id,
    ) {
        Ok(bearer) => bearer,
        Err(err) => {
            error!("Failed to issue bearer token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    auth_state
        .audit()
        .log(
            AuditEntry::new("login_success", "user")
                .with_actor(user.user_id)
                .with_entity_id(user.user_id)
                .with_ip(client_ip)
                .with_user_agent(request_user_agent(&headers)),
        )
        .await;
    info!(username = %user.username, "Login successful");

    let principal = Principal::from_snapshot(snapshot);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    let response = (
        StatusCode::OK,
        response_headers,
        Json(LoginResponse {
            mfa_required: false,
            token: Some(bearer),
            expires_in: Some(auth_state.signer().ttl_seconds()),
            principal: Some(principal_response(&principal)),
        }),
    )
        .into_response();
    with_rate_limit_headers(response, &decision)
}

/// Destroy the current session. Idempotent.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_cookie_token(&headers) {
        // Resolve the actor for the audit trail before the row disappears.
        let actor = match auth_state.sessions().load(&token).await {
            Ok(record) => record.map(|record| record.snapshot.user_id),
            Err(err) => {
                error!("Failed to load session during logout: {err}");
                None
            }
        };
        if let Err(err) = auth_state.sessions().destroy(&token).await {
            error!("Failed to destroy session: {err}");
        }
        if let Some(user_id) = actor {
            auth_state
                .audit()
                .log(
                    AuditEntry::new("logout", "user")
                        .with_actor(user_id)
                        .with_entity_id(user_id)
                        .with_ip(extract_client_ip(&headers))
                        .with_user_agent(request_user_agent(&headers)),
                )
                .await;
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Introspect the current principal.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = PrincipalResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> axum::response::Response {
    let policy = auth_state.config().api_policy();
    let subject = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    let decision = auth_state.limiter().check(&policy.key(&subject), &policy);
    if !decision.allowed {
        return rate_limited_response(&decision);
    }

    // Missing or challenge-only credentials are "no session" rather than an
    // error, to avoid leaking auth state to probes.
    let response = match require_auth(&headers, &auth_state).await {
        Ok(principal) => (StatusCode::OK, Json(principal_response(&principal))).into_response(),
        Err(
            AuthError::Unauthenticated
            | AuthError::MfaRequired
            | AuthError::TokenExpired
            | AuthError::TokenMalformed,
        ) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    };
    with_rate_limit_headers(response, &decision)
}

/// Switch the organization the session acts in. Explicit, audited, and
/// separately permissioned; bearer-token principals cannot use it.
#[utoipa::path(
    post,
    path = "/v1/auth/assume-organization",
    request_body = AssumeOrganizationRequest,
    responses(
        (status = 200, description = "Organization assumed", body = PrincipalResponse),
        (status = 400, description = "Invalid organization id"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Insufficient permissions")
    ),
    tag = "auth"
)]
pub async fn assume_organization(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<AssumeOrganizationRequest>>,
) -> axum::response::Response {
    let (principal, session_token) = match require_session_auth(&headers, &auth_state).await {
        Ok(resolved) => resolved,
        Err(err) => return err.into_response(),
    };

    if let Err(err) = authorize_super_or_org_admin(&principal) {
        return err.into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    let Ok(target) = Uuid::parse_str(request.organization_id.trim()) else {
        return (StatusCode::BAD_REQUEST, "Invalid organization id").into_response();
    };

    // Org admins may only switch back to their home organization; crossing
    // the tenancy boundary is reserved for super admins.
    if !principal.role.is_super_admin() && target != principal.organization_id {
        return AuthError::InsufficientPermissions.into_response();
    }

    let updated = match auth_state
        .sessions()
        .assume_organization(&session_token, target)
        .await
    {
        Ok(updated) => updated,
        Err(err) => {
            error!("Failed to update session organization: {err}");
            return AuthError::StoreUnavailable.into_response();
        }
    };
    if !updated {
        return AuthError::Unauthenticated.into_response();
    }

    auth_state
        .audit()
        .log(
            AuditEntry::new("assume_organization", "organization")
                .with_actor(principal.user_id)
                .with_entity_id(target)
                .with_details(serde_json::json!({
                    "from": principal.current_organization_id.to_string(),
                    "to": target.to_string(),
                }))
                .with_ip(extract_client_ip(&headers))
                .with_user_agent(request_user_agent(&headers)),
        )
        .await;
    info!(user_id = %principal.user_id, organization_id = %target, "Organization assumed");

    let mut assumed = principal;
    assumed.current_organization_id = target;
    (StatusCode::OK, Json(principal_response(&assumed))).into_response()
}
