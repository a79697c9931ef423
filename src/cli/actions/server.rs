use crate::{
    api::{self, handlers::auth::AuthConfig},
    token::TokenSigner,
};
use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub production: bool,
    pub token_secret: Option<SecretString>,
    pub token_ttl_seconds: i64,
    pub session_max_age_seconds: i64,
    pub totp_issuer: String,
    pub mfa_encryption_key: Option<SecretString>,
    pub backup_code_pepper: Option<SecretString>,
    pub rate_limit_auth_max: u32,
    pub rate_limit_api_max: u32,
    pub rate_limit_sensitive_max: u32,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if secret material is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    // Dispatch already rejected missing secrets in production; here missing
    // means development, where ephemeral secrets are generated loudly.
    let token_secret = match args.token_secret {
        Some(secret) => secret,
        None => {
            warn!(
                "No token-signing secret configured; generated an ephemeral one. \
                 All bearer tokens become invalid on restart. \
                 Set GARDISTO_TOKEN_SECRET before deploying."
            );
            generated_secret()?
        }
    };

    let mfa_encryption_key = match args.mfa_encryption_key {
        Some(secret) => decode_key(secret.expose_secret())?,
        None => {
            warn!(
                "No MFA encryption key configured; generated an ephemeral one. \
                 Stored TOTP secrets become undecryptable on restart. \
                 Set GARDISTO_MFA_ENCRYPTION_KEY before deploying."
            );
            random_key()?
        }
    };

    let backup_code_pepper: Arc<[u8]> = match args.backup_code_pepper {
        Some(secret) => Arc::from(secret.expose_secret().as_bytes()),
        None => {
            warn!(
                "No backup-code pepper configured; generated an ephemeral one. \
                 Existing backup codes stop verifying on restart. \
                 Set GARDISTO_BACKUP_CODE_PEPPER before deploying."
            );
            Arc::from(generated_secret()?.expose_secret().as_bytes())
        }
    };

    let auth_config = AuthConfig::new(args.production)
        .with_session_max_age_seconds(args.session_max_age_seconds)
        .with_totp_issuer(args.totp_issuer)
        .with_mfa_encryption_key(mfa_encryption_key)
        .with_backup_code_pepper(backup_code_pepper)
        .with_rate_limit_maxes(
            args.rate_limit_auth_max,
            args.rate_limit_api_max,
            args.rate_limit_sensitive_max,
        );

    let signer = TokenSigner::new(
        token_secret.expose_secret().as_bytes(),
        args.token_ttl_seconds,
    );

    api::new(args.port, args.dsn, auth_config, signer).await
}

fn generated_secret() -> Result<SecretString> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate secret")?;
    Ok(SecretString::from(STANDARD.encode(bytes)))
}

fn random_key() -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut key)
        .context("failed to generate key")?;
    Ok(key)
}

fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("MFA encryption key is not valid base64")?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow!("MFA encryption key must be exactly 32 bytes"))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::{decode_key, generated_secret, random_key};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use secrecy::ExposeSecret;

    #[test]
    fn generated_secret_is_base64_of_32_bytes() {
        let secret = generated_secret().expect("secret");
        let decoded = STANDARD
            .decode(secret.expose_secret().as_bytes())
            .expect("base64");
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn decode_key_round_trips() {
        let key = random_key().expect("key");
        let encoded = STANDARD.encode(key);
        assert_eq!(decode_key(&encoded).expect("decode"), key);
    }

    #[test]
    fn decode_key_rejects_wrong_length() {
        let encoded = STANDARD.encode([0u8; 16]);
        assert!(decode_key(&encoded).is_err());
        assert!(decode_key("not-base64!").is_err());
    }
}
