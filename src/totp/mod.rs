//! TOTP enrollment and verification (RFC 6238).
//!
//! SHA-1, 6 digits, 30-second steps, ±1 step of clock skew — the parameters
//! every mainstream authenticator app assumes. Secrets at rest are sealed by
//! [`crypto`]; this module only ever sees plaintext secret bytes.

pub mod crypto;

use anyhow::{Result, anyhow};
use totp_rs::{Algorithm, Secret, TOTP};

/// Material produced when a user starts enrollment. The plaintext secret is
/// shown to the user exactly once and never logged.
pub struct TotpEnrollment {
    pub secret_base32: String,
    pub otpauth_url: String,
    pub qr_code: String,
    pub secret_bytes: Vec<u8>,
}

fn build_totp(secret_bytes: Vec<u8>, issuer: &str, account: &str) -> Result<TOTP> {
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| anyhow!("TOTP init error: {e}"))
}

/// Generate a fresh enrollment: secret, otpauth URL, and QR data URL.
///
/// # Errors
/// Returns an error if secret generation or QR rendering fails.
pub fn generate_enrollment(issuer: &str, account: &str) -> Result<TotpEnrollment> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret
        .to_bytes()
        .map_err(|e| anyhow!("secret generation error: {e}"))?;

    let totp = build_totp(secret_bytes.clone(), issuer, account)?;
    let qr = totp
        .get_qr_base64()
        .map_err(|e| anyhow!("QR generation error: {e}"))?;

    Ok(TotpEnrollment {
        secret_base32: totp.get_secret_base32(),
        otpauth_url: totp.get_url(),
        qr_code: format!("data:image/png;base64,{qr}"),
        secret_bytes,
    })
}

/// Verify a code against a raw secret within the allowed skew window.
///
/// # Errors
/// Returns an error if the secret bytes cannot initialize a TOTP instance.
pub fn verify_code(secret_bytes: &[u8], code: &str, issuer: &str, account: &str) -> Result<bool> {
    let totp = build_totp(secret_bytes.to_vec(), issuer, account)?;
    Ok(totp.check_current(code).unwrap_or(false))
}
