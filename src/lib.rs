//! # Gardisto (Authentication & Access Control Core)
//!
//! `gardisto` is the authentication authority for a multi-tenant clinical
//! platform. It verifies credentials, materializes a per-request principal
//! from either a bearer token or a server-side session, enforces role-based
//! authorization, runs the TOTP second-factor subsystem, and throttles
//! abusive clients.
//!
//! ## Tenant Model (Organizations)
//!
//! Organizations are the tenancy boundary. Every user belongs to exactly one
//! organization; a principal additionally carries the organization it is
//! currently acting in, which only diverges from the home organization
//! through the explicit, audited assume-organization operation.
//!
//! ## Authentication
//!
//! Two carriers exist and exactly one determines the principal per request:
//!
//! - **Sessions** (primary): opaque 256-bit tokens in an `HttpOnly` cookie,
//!   stored hashed server-side with sliding expiry. Revocable.
//! - **Bearer tokens** (interop): signed JWTs for non-browser clients.
//!   Irrevocable until expiry; rotation of the signing secret is the only
//!   kill switch.
//!
//! ## Authorization & Roles
//!
//! Roles are a closed set (doctor, nurse, pharmacist, physiotherapist,
//! admin, receptionist, lab technician, read-only, super admin). There is no
//! role hierarchy; the only special case is the super-admin bypass, which
//! admits every role check.

pub mod api;
pub mod audit;
pub mod cli;
pub mod rate_limit;
pub mod session;
pub mod token;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
