//! Sealing of TOTP secrets at rest.
//!
//! `ChaCha20-Poly1305` with the AAD bound to the owning user, so a row moved
//! between users fails authentication instead of decrypting.

use anyhow::Result;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{RngCore, rngs::OsRng};
use uuid::Uuid;

/// Encrypt a TOTP secret. Returns `nonce (12 bytes) || ciphertext`.
///
/// # Errors
/// Returns an error if encryption fails.
pub fn seal_secret(key: &[u8; 32], secret: &[u8], user_id: Uuid) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = construct_aad(user_id);
    let payload = Payload {
        msg: secret,
        aad: &aad,
    };

    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("encryption failure: {e}"))?;

    let mut result = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt a sealed TOTP secret. Expects `nonce (12 bytes) || ciphertext`.
///
/// # Errors
/// Returns an error if the ciphertext is too short, tampered, or bound to a
/// different user.
pub fn open_secret(key: &[u8; 32], data: &[u8], user_id: Uuid) -> Result<Vec<u8>> {
    if data.len() < 12 {
        return Err(anyhow::anyhow!("invalid ciphertext length"));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let aad = construct_aad(user_id);
    let payload = Payload {
        msg: ciphertext,
        aad: &aad,
    };

    cipher
        .decrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("decryption failure: {e}"))
}

fn construct_aad(user_id: Uuid) -> Vec<u8> {
    format!("totp-secret:v1|{user_id}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [42u8; 32];
        let secret = b"totp-secret-bytes";
        let user_id = Uuid::new_v4();

        let sealed = seal_secret(&key, secret, user_id).expect("seal");
        assert_ne!(sealed.as_slice(), secret.as_slice());

        let opened = open_secret(&key, &sealed, user_id).expect("open");
        assert_eq!(opened, secret);
    }

    #[test]
    fn open_fails_for_wrong_user() {
        let key = [42u8; 32];
        let sealed = seal_secret(&key, b"secret", Uuid::new_v4()).expect("seal");
        assert!(open_secret(&key, &sealed, Uuid::new_v4()).is_err());
    }

    #[test]
    fn open_fails_for_wrong_key() {
        let sealed = seal_secret(&[1u8; 32], b"secret", Uuid::nil()).expect("seal");
        assert!(open_secret(&[2u8; 32], &sealed, Uuid::nil()).is_err());
    }

    #[test]
    fn open_fails_on_tampered_ciphertext() {
        let key = [42u8; 32];
        let user_id = Uuid::new_v4();
        let mut sealed = seal_secret(&key, b"secret", user_id).expect("seal");

        let len = sealed.len();
        if let Some(byte) = sealed.get_mut(len - 1) {
            *byte ^= 0xFF;
        }

        assert!(open_secret(&key, &sealed, user_id).is_err());
    }

    #[test]
    fn open_rejects_short_input() {
        assert!(open_secret(&[0u8; 32], &[0u8; 4], Uuid::nil()).is_err());
    }
}
