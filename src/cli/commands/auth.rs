use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_SESSION_MAX_AGE_SECONDS: &str = "session-max-age-seconds";
pub const ARG_TOTP_ISSUER: &str = "totp-issuer";
pub const ARG_MFA_ENCRYPTION_KEY: &str = "mfa-encryption-key";
pub const ARG_BACKUP_CODE_PEPPER: &str = "backup-code-pepper";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("Secret used to sign bearer tokens (required in production)")
                .env("GARDISTO_TOKEN_SECRET"),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long("token-ttl-seconds")
                .help("Bearer token TTL in seconds")
                .env("GARDISTO_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_MAX_AGE_SECONDS)
                .long("session-max-age-seconds")
                .help("Sliding session max-age in seconds")
                .env("GARDISTO_SESSION_MAX_AGE_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOTP_ISSUER)
                .long("totp-issuer")
                .help("Issuer shown in authenticator apps")
                .env("GARDISTO_TOTP_ISSUER")
                .default_value("Gardisto"),
        )
        .arg(
            Arg::new(ARG_MFA_ENCRYPTION_KEY)
                .long("mfa-encryption-key")
                .help("Base64 32-byte key encrypting TOTP secrets at rest (required in production)")
                .env("GARDISTO_MFA_ENCRYPTION_KEY"),
        )
        .arg(
            Arg::new(ARG_BACKUP_CODE_PEPPER)
                .long("backup-code-pepper")
                .help("Server-side pepper for backup-code hashing (required in production)")
                .env("GARDISTO_BACKUP_CODE_PEPPER"),
        )
}

/// Parsed auth options.
#[derive(Debug)]
pub struct Options {
    pub token_secret: Option<SecretString>,
    pub token_ttl_seconds: i64,
    pub session_max_age_seconds: i64,
    pub totp_issuer: String,
    pub mfa_encryption_key: Option<SecretString>,
    pub backup_code_pepper: Option<SecretString>,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a TTL argument is missing its default.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            token_secret: matches
                .get_one::<String>(ARG_TOKEN_SECRET)
                .cloned()
                .map(SecretString::from),
            token_ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
            session_max_age_seconds: matches
                .get_one::<i64>(ARG_SESSION_MAX_AGE_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
            totp_issuer: matches
                .get_one::<String>(ARG_TOTP_ISSUER)
                .cloned()
                .unwrap_or_else(|| "Gardisto".to_string()),
            mfa_encryption_key: matches
                .get_one::<String>(ARG_MFA_ENCRYPTION_KEY)
                .cloned()
                .map(SecretString::from),
            backup_code_pepper: matches
                .get_one::<String>(ARG_BACKUP_CODE_PEPPER)
                .cloned()
                .map(SecretString::from),
        })
    }
}
