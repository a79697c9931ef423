//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, ARG_PRODUCTION, auth, limits};
use anyhow::{Context, Result, bail};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing, or if production mode
/// is requested without the mandatory secrets.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let production = matches.get_flag(ARG_PRODUCTION);

    let auth_opts = auth::Options::parse(matches)?;
    let limit_opts = limits::Options::parse(matches);

    // Secrets may be auto-generated in development, never in production.
    if production {
        if auth_opts.token_secret.is_none() {
            bail!("production mode requires --token-secret (GARDISTO_TOKEN_SECRET)");
        }
        if auth_opts.mfa_encryption_key.is_none() {
            bail!("production mode requires --mfa-encryption-key (GARDISTO_MFA_ENCRYPTION_KEY)");
        }
        if auth_opts.backup_code_pepper.is_none() {
            bail!("production mode requires --backup-code-pepper (GARDISTO_BACKUP_CODE_PEPPER)");
        }
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        production,
        token_secret: auth_opts.token_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        session_max_age_seconds: auth_opts.session_max_age_seconds,
        totp_issuer: auth_opts.totp_issuer,
        mfa_encryption_key: auth_opts.mfa_encryption_key,
        backup_code_pepper: auth_opts.backup_code_pepper,
        rate_limit_auth_max: limit_opts.auth_max,
        rate_limit_api_max: limit_opts.api_max,
        rate_limit_sensitive_max: limit_opts.sensitive_max,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn production_requires_token_secret() {
        temp_env::with_vars(
            [
                ("GARDISTO_TOKEN_SECRET", None::<&str>),
                ("GARDISTO_MFA_ENCRYPTION_KEY", None::<&str>),
                ("GARDISTO_BACKUP_CODE_PEPPER", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "gardisto",
                    "--dsn",
                    "postgres://localhost",
                    "--production",
                ]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("--token-secret"));
                }
            },
        );
    }

    #[test]
    fn development_allows_missing_secrets() {
        temp_env::with_vars(
            [
                ("GARDISTO_TOKEN_SECRET", None::<&str>),
                ("GARDISTO_MFA_ENCRYPTION_KEY", None::<&str>),
                ("GARDISTO_BACKUP_CODE_PEPPER", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches =
                    command.get_matches_from(vec!["gardisto", "--dsn", "postgres://localhost"]);
                let action = handler(&matches).expect("dispatch");
                let Action::Server(args) = action;
                assert!(!args.production);
                assert!(args.token_secret.is_none());
                assert_eq!(args.rate_limit_auth_max, 10);
            },
        );
    }
}
