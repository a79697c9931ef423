//! Principal materialization and authorization guards.
//!
//! Flow Overview: exactly one carrier determines the principal per request.
//! A `Bearer` authorization header is resolved against the token signer and
//! never falls back to the cookie; without it, the session cookie is
//! resolved against the session store, which atomically touches the session
//! (sliding expiry). Guards then decide 401 (no principal) vs 403
//! (principal present, insufficient role).

use axum::http::HeaderMap;
use tracing::error;
use uuid::Uuid;

use super::{
    error::AuthError,
    role::Role,
    state::AuthState,
    utils::{extract_bearer_token, extract_cookie_token},
};
use crate::{
    session::{SessionKind, SessionSnapshot},
    token::{TokenClaims, TokenError},
};

/// Resolved identity, role, and tenant context for one request.
///
/// `organization_id` is the home organization; `current_organization_id` is
/// the organization the principal acts in and only diverges after an
/// explicit assume-organization call. Both are immutable for the duration
/// of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub organization_id: Uuid,
    pub current_organization_id: Uuid,
}

impl Principal {
    pub(crate) fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            user_id: snapshot.user_id,
            username: snapshot.username,
            role: snapshot.role,
            organization_id: snapshot.organization_id,
            current_organization_id: snapshot.current_organization_id,
        }
    }

    /// Token principals always act in their home organization.
    pub(crate) fn from_claims(claims: &TokenClaims) -> Result<Self, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenMalformed)?;
        let organization_id =
            Uuid::parse_str(&claims.org).map_err(|_| AuthError::TokenMalformed)?;
        Ok(Self {
            user_id,
            username: claims.username.clone(),
            role: claims.role,
            organization_id,
            current_organization_id: organization_id,
        })
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user_id: self.user_id,
            username: self.username.clone(),
            role: self.role,
            organization_id: self.organization_id,
            current_organization_id: self.current_organization_id,
        }
    }
}

pub(crate) struct Authenticated {
    pub(crate) principal: Principal,
    pub(crate) kind: SessionKind,
    pub(crate) session_token: Option<String>,
}

async fn authenticate(headers: &HeaderMap, state: &AuthState) -> Result<Authenticated, AuthError> {
    // Bearer header present: the token alone decides. A failed token never
    // falls through to the cookie, keeping one carrier authoritative.
    if let Some(bearer) = extract_bearer_token(headers) {
        let claims = state.signer().verify(&bearer).map_err(|err| match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed(_) => AuthError::TokenMalformed,
        })?;
        return Ok(Authenticated {
            principal: Principal::from_claims(&claims)?,
            kind: SessionKind::Full,
            session_token: None,
        });
    }

    let Some(cookie) = extract_cookie_token(headers) else {
        return Err(AuthError::Unauthenticated);
    };
    let record = state.sessions().load(&cookie).await.map_err(|err| {
        error!("Failed to load session: {err}");
        AuthError::StoreUnavailable
    })?;
    let Some(record) = record else {
        return Err(AuthError::Unauthenticated);
    };
    Ok(Authenticated {
        principal: Principal::from_snapshot(record.snapshot),
        kind: record.kind,
        session_token: Some(cookie),
    })
}

/// Resolve a full-capability principal, or fail with 401-class errors.
/// Challenge sessions do not authenticate normal routes.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Principal, AuthError> {
    let authenticated = authenticate(headers, state).await?;
    match authenticated.kind {
        SessionKind::Full => Ok(authenticated.principal),
        SessionKind::MfaChallenge => Err(AuthError::MfaRequired),
    }
}

/// Resolve a principal from any session kind, for MFA flows that must work
/// on both a challenge session and a full one.
pub(crate) async fn require_any_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<(Principal, SessionKind), AuthError> {
    let authenticated = authenticate(headers, state).await?;
    Ok((authenticated.principal, authenticated.kind))
}

/// Resolve a principal from the session carrier only, returning the raw
/// token so the caller can mutate the live session row. Bearer principals
/// are rejected: session-bound operations have no meaning for them.
pub(crate) async fn require_session_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<(Principal, String), AuthError> {
    if extract_bearer_token(headers).is_some() {
        return Err(AuthError::InsufficientPermissions);
    }
    let authenticated = authenticate(headers, state).await?;
    match (authenticated.kind, authenticated.session_token) {
        (SessionKind::Full, Some(token)) => Ok((authenticated.principal, token)),
        _ => Err(AuthError::Unauthenticated),
    }
}

/// Admit iff the principal holds `role`, or is a super admin.
pub fn authorize(principal: &Principal, role: Role) -> Result<(), AuthError> {
    if principal.role == role || principal.role.is_super_admin() {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

/// Admit iff the principal's role is in `roles`, or is a super admin.
pub fn authorize_any(principal: &Principal, roles: &[Role]) -> Result<(), AuthError> {
    if roles.contains(&principal.role) || principal.role.is_super_admin() {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

/// Organization-management rule admitting super admins and org admins.
///
/// Deliberately its own rule rather than a call into `authorize_any`: audit
/// trails must stay unambiguous about which policy admitted a request.
pub fn authorize_super_or_org_admin(principal: &Principal) -> Result<(), AuthError> {
    match principal.role {
        Role::SuperAdmin | Role::Admin => Ok(()),
        _ => Err(AuthError::InsufficientPermissions),
    }
}
