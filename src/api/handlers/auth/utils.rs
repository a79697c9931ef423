//! Small helpers for auth validation, credential carriers, and cookies.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};
use axum::response::{IntoResponse, Response};
use regex::Regex;

use super::error::AuthError;
use super::state::AuthConfig;
use crate::rate_limit::RateLimitDecision;

pub(super) const SESSION_COOKIE_NAME: &str = "gardisto_session";

/// Normalize a username for lookup/uniqueness checks.
pub(super) fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Basic username shape check on already-normalized input.
pub(super) fn valid_username(username_normalized: &str) -> bool {
    Regex::new(r"^[a-z0-9][a-z0-9._-]{2,31}$")
        .is_ok_and(|regex| regex.is_match(username_normalized))
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extract a bearer token from the `Authorization` header.
pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract the session token from the cookie header. The bearer header is
/// deliberately not consulted here: carriers are resolved one at a time.
pub(super) fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

/// Build the `HttpOnly` session cookie.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let same_site = config.session_cookie_same_site();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite={same_site}; \
         Max-Age={max_age_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// 429 response carrying `Retry-After` and the `X-RateLimit-*` metadata.
pub(super) fn rate_limited_response(decision: &RateLimitDecision) -> Response {
    let mut response = AuthError::RateLimited {
        retry_after_seconds: decision.retry_after_seconds(),
    }
    .into_response();
    response.headers_mut().extend(decision.headers());
    response
}

/// Attach `X-RateLimit-*` metadata to a successful response.
pub(super) fn with_rate_limit_headers(
    mut response: Response,
    decision: &RateLimitDecision,
) -> Response {
    response.headers_mut().extend(decision.headers());
    response
}

/// Build the expired cookie clearing the session on logout.
pub(super) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let same_site = config.session_cookie_same_site();
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite={same_site}; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
