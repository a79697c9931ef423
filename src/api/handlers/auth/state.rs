//! Auth state and configuration.

use std::sync::Arc;

use crate::{
    audit::AuditLogger,
    rate_limit::{
        API_WINDOW, AUTH_WINDOW, RateLimitPolicy, RateLimitStore, SENSITIVE_WINDOW,
    },
    session::SessionStore,
    token::TokenSigner,
};

const DEFAULT_SESSION_MAX_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_RATE_LIMIT_AUTH_MAX: u32 = 10;
const DEFAULT_RATE_LIMIT_API_MAX: u32 = 100;
const DEFAULT_RATE_LIMIT_SENSITIVE_MAX: u32 = 5;
const DEV_BACKUP_CODE_PEPPER: &[u8] = b"gardisto-development-pepper";

#[derive(Clone)]
pub struct AuthConfig {
    production: bool,
    session_max_age_seconds: i64,
    challenge_ttl_seconds: i64,
    totp_issuer: String,
    mfa_encryption_key: [u8; 32],
    backup_code_pepper: Arc<[u8]>,
    rate_limit_auth_max: u32,
    rate_limit_api_max: u32,
    rate_limit_sensitive_max: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(production: bool) -> Self {
        Self {
            production,
            session_max_age_seconds: DEFAULT_SESSION_MAX_AGE_SECONDS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            totp_issuer: "Gardisto".to_string(),
            mfa_encryption_key: [0u8; 32],
            backup_code_pepper: Arc::from(DEV_BACKUP_CODE_PEPPER),
            rate_limit_auth_max: DEFAULT_RATE_LIMIT_AUTH_MAX,
            rate_limit_api_max: DEFAULT_RATE_LIMIT_API_MAX,
            rate_limit_sensitive_max: DEFAULT_RATE_LIMIT_SENSITIVE_MAX,
        }
    }

    #[must_use]
    pub fn with_session_max_age_seconds(mut self, seconds: i64) -> Self {
        self.session_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: i64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_mfa_encryption_key(mut self, key: [u8; 32]) -> Self {
        self.mfa_encryption_key = key;
        self
    }

    #[must_use]
    pub fn with_backup_code_pepper(mut self, pepper: Arc<[u8]>) -> Self {
        self.backup_code_pepper = pepper;
        self
    }

    #[must_use]
    pub fn with_rate_limit_maxes(mut self, auth: u32, api: u32, sensitive: u32) -> Self {
        self.rate_limit_auth_max = auth;
        self.rate_limit_api_max = api;
        self.rate_limit_sensitive_max = sensitive;
        self
    }

    #[must_use]
    pub fn production(&self) -> bool {
        self.production
    }

    #[must_use]
    pub fn session_max_age_seconds(&self) -> i64 {
        self.session_max_age_seconds
    }

    #[must_use]
    pub fn challenge_ttl_seconds(&self) -> i64 {
        self.challenge_ttl_seconds
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    pub(crate) fn mfa_encryption_key(&self) -> &[u8; 32] {
        &self.mfa_encryption_key
    }

    pub(crate) fn backup_code_pepper(&self) -> &[u8] {
        &self.backup_code_pepper
    }

    /// Cookies are only marked `Secure` in production deployments, which are
    /// always served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.production
    }

    /// `Strict` in production, `Lax` in development so local frontends on
    /// other ports keep working.
    pub(crate) fn session_cookie_same_site(&self) -> &'static str {
        if self.production { "Strict" } else { "Lax" }
    }

    #[must_use]
    pub fn auth_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new("auth", AUTH_WINDOW, self.rate_limit_auth_max)
    }

    #[must_use]
    pub fn api_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new("api", API_WINDOW, self.rate_limit_api_max)
    }

    #[must_use]
    pub fn sensitive_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new("sensitive", SENSITIVE_WINDOW, self.rate_limit_sensitive_max)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("production", &self.production)
            .field("session_max_age_seconds", &self.session_max_age_seconds)
            .field("challenge_ttl_seconds", &self.challenge_ttl_seconds)
            .field("totp_issuer", &self.totp_issuer)
            .field("mfa_encryption_key", &"***")
            .field("backup_code_pepper", &"***")
            .field("rate_limit_auth_max", &self.rate_limit_auth_max)
            .field("rate_limit_api_max", &self.rate_limit_api_max)
            .field("rate_limit_sensitive_max", &self.rate_limit_sensitive_max)
            .finish()
    }
}

pub struct AuthState {
    config: AuthConfig,
    signer: TokenSigner,
    sessions: Arc<dyn SessionStore>,
    limiter: Arc<dyn RateLimitStore>,
    audit: AuditLogger,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        signer: TokenSigner,
        sessions: Arc<dyn SessionStore>,
        limiter: Arc<dyn RateLimitStore>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            config,
            signer,
            sessions,
            limiter,
            audit,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub(crate) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub(crate) fn limiter(&self) -> &dyn RateLimitStore {
        self.limiter.as_ref()
    }

    pub(crate) fn audit(&self) -> &AuditLogger {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new(false);

        assert!(!config.production());
        assert_eq!(config.session_max_age_seconds(), 30 * 24 * 60 * 60);
        assert_eq!(config.challenge_ttl_seconds(), 300);
        assert_eq!(config.totp_issuer(), "Gardisto");
        assert_eq!(config.auth_policy().max_requests, 10);
        assert_eq!(config.api_policy().max_requests, 100);
        assert_eq!(config.sensitive_policy().max_requests, 5);

        let config = config
            .with_session_max_age_seconds(60)
            .with_challenge_ttl_seconds(30)
            .with_totp_issuer("Clinic".to_string())
            .with_rate_limit_maxes(3, 50, 2);

        assert_eq!(config.session_max_age_seconds(), 60);
        assert_eq!(config.challenge_ttl_seconds(), 30);
        assert_eq!(config.totp_issuer(), "Clinic");
        assert_eq!(config.auth_policy().max_requests, 3);
        assert_eq!(config.api_policy().max_requests, 50);
        assert_eq!(config.sensitive_policy().max_requests, 2);
    }

    #[test]
    fn cookie_flags_follow_environment() {
        let dev = AuthConfig::new(false);
        assert!(!dev.session_cookie_secure());
        assert_eq!(dev.session_cookie_same_site(), "Lax");

        let production = AuthConfig::new(true);
        assert!(production.session_cookie_secure());
        assert_eq!(production.session_cookie_same_site(), "Strict");
    }

    #[test]
    fn debug_redacts_secret_material() {
        let config = AuthConfig::new(false).with_mfa_encryption_key([42u8; 32]);
        let debug = format!("{config:?}");
        assert!(debug.contains("***"));
        assert!(!debug.contains("42"));
    }

    #[test]
    fn policies_carry_distinct_names() {
        let config = AuthConfig::new(false);
        assert_eq!(config.auth_policy().name, "auth");
        assert_eq!(config.api_policy().name, "api");
        assert_eq!(config.sensitive_policy().name, "sensitive");
        assert!(config.sensitive_policy().window > config.auth_policy().window);
    }
}
