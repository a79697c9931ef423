//! Backup code generation and verification.
//!
//! Backup codes are the single-use fallback factor for when the
//! authenticator device is unavailable. Codes are Argon2id-hashed with a
//! server-side pepper; plaintext exists only in the response that delivers
//! a fresh batch to the user.

use anyhow::{Context, Result};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::{RngCore, rngs::OsRng};

pub(crate) const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 10;
const BACKUP_CODE_GROUP_SIZE: usize = 5;
// No I, L, O, 0, 1: transcription mistakes are the common failure here.
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// A freshly generated backup-code batch (plaintext + hashes).
#[derive(Debug)]
pub struct BackupCodeBatch {
    pub codes: Vec<String>,
    pub code_hashes: Vec<String>,
}

impl BackupCodeBatch {
    /// Generate a new batch using the provided pepper.
    pub fn generate(pepper: &[u8]) -> Result<Self> {
        let mut rng = OsRng;
        Self::generate_with_rng(&mut rng, pepper)
    }

    fn generate_with_rng<R: RngCore + ?Sized>(rng: &mut R, pepper: &[u8]) -> Result<Self> {
        let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
        let mut code_hashes = Vec::with_capacity(BACKUP_CODE_COUNT);
        for _ in 0..BACKUP_CODE_COUNT {
            let code = generate_code(rng)?;
            let hash = hash_backup_code(&code, pepper)?;
            codes.push(code);
            code_hashes.push(hash);
        }
        Ok(Self { codes, code_hashes })
    }
}

/// Normalize a backup code for verification.
pub fn normalize_backup_code(input: &str) -> Result<String> {
    let normalized: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow::anyhow!("invalid backup code length"));
    }

    if !normalized
        .as_bytes()
        .iter()
        .all(|ch| BACKUP_CODE_ALPHABET.contains(ch))
    {
        return Err(anyhow::anyhow!("invalid backup code characters"));
    }

    Ok(normalized)
}

/// Format a normalized backup code for display.
pub fn format_backup_code(normalized: &str) -> Result<String> {
    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow::anyhow!("invalid backup code length"));
    }
    let mut out = String::with_capacity(BACKUP_CODE_LEN + 1);
    for (idx, chunk) in normalized
        .as_bytes()
        .chunks(BACKUP_CODE_GROUP_SIZE)
        .enumerate()
    {
        if idx > 0 {
            out.push('-');
        }
        out.push_str(std::str::from_utf8(chunk).context("invalid backup code chunk")?);
    }
    Ok(out)
}

/// Verify a backup code against a stored hash.
pub fn verify_backup_code(code: &str, stored_hash: &str, pepper: &[u8]) -> Result<bool> {
    let normalized = normalize_backup_code(code)?;
    let parsed =
        PasswordHash::new(stored_hash).map_err(|_| anyhow::anyhow!("invalid backup code hash"))?;
    let argon2 = argon2_with_pepper(pepper)?;
    Ok(argon2
        .verify_password(normalized.as_bytes(), &parsed)
        .is_ok())
}

fn argon2_with_pepper(pepper: &[u8]) -> Result<Argon2<'_>> {
    Argon2::new_with_secret(
        pepper,
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::default(),
    )
    .map_err(|_| anyhow::anyhow!("failed to initialize Argon2id"))
}

fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> Result<String> {
    let mut raw = [0u8; BACKUP_CODE_LEN];
    rng.fill_bytes(&mut raw);
    let mut normalized = String::with_capacity(BACKUP_CODE_LEN);
    for byte in raw {
        let idx = usize::from(byte) % BACKUP_CODE_ALPHABET.len();
        if let Some(&char_byte) = BACKUP_CODE_ALPHABET.get(idx) {
            normalized.push(char_byte as char);
        }
    }
    format_backup_code(&normalized)
}

fn hash_backup_code(code: &str, pepper: &[u8]) -> Result<String> {
    let normalized = normalize_backup_code(code)?;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = argon2_with_pepper(pepper)?;
    let hash = argon2
        .hash_password(normalized.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("failed to hash backup code"))?
        .to_string();
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::{
        BACKUP_CODE_COUNT, BackupCodeBatch, format_backup_code, normalize_backup_code,
        verify_backup_code,
    };

    #[test]
    fn normalize_strips_separators_and_uppercases() {
        let normalized = normalize_backup_code("abcde-fghjk").expect("normalize");
        assert_eq!(normalized, "ABCDEFGHJK");
    }

    #[test]
    fn normalize_rejects_wrong_lengths_and_ambiguous_chars() {
        assert!(normalize_backup_code("short").is_err());
        // 'I' and 'O' are excluded from the alphabet.
        assert!(normalize_backup_code("IIIII-OOOOO").is_err());
    }

    #[test]
    fn format_groups_in_fives() {
        let formatted = format_backup_code("ABCDEFGHJK").expect("format");
        assert_eq!(formatted, "ABCDE-FGHJK");
    }

    #[test]
    fn batch_has_fixed_size_and_verifying_hashes() {
        let pepper = b"pepper";
        let batch = BackupCodeBatch::generate(pepper).expect("batch");
        assert_eq!(batch.codes.len(), BACKUP_CODE_COUNT);
        assert_eq!(batch.code_hashes.len(), BACKUP_CODE_COUNT);

        let code = batch.codes.first().expect("code");
        let hash = batch.code_hashes.first().expect("hash");
        assert!(verify_backup_code(code, hash, pepper).expect("verify"));
        assert!(!verify_backup_code("ABCDE-23456", hash, pepper).expect("verify"));
    }

    #[test]
    fn pepper_mismatch_fails_verification() {
        let batch = BackupCodeBatch::generate(b"pepper-a").expect("batch");
        let code = batch.codes.first().expect("code");
        let hash = batch.code_hashes.first().expect("hash");
        assert!(!verify_backup_code(code, hash, b"pepper-b").expect("verify"));
    }
}
