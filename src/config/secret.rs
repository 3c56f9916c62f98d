//! Encryption at rest for bootstrap configuration
//!
//! Configuration files carry the bot token and the seed watches, so they
//! are kept encrypted in the repository and decrypted at start-up with a
//! password taken from the environment.
//!
//! # Format
//!
//! ```text
//! base64( salt[16] || nonce[12] || AES-256-GCM(ciphertext || tag[16]) )
//! ```
//!
//! The key is derived with PBKDF2-HMAC-SHA256 over the password and the
//! salt (100 000 iterations, 32 bytes). The layout matches what the
//! WebCrypto API produces, so files encrypted by earlier tooling stay
//! readable.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use thiserror::Error;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// Errors raised while encrypting or decrypting configuration
#[derive(Error, Debug)]
pub enum SecretError {
    /// Input is not valid base64
    #[error("Encrypted payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Payload shorter than salt + nonce + tag
    #[error("Encrypted payload is truncated ({0} bytes)")]
    Truncated(usize),

    /// Wrong password or tampered payload
    #[error("Decryption failed (wrong password or corrupted payload)")]
    Authentication,

    /// Decrypted bytes are not UTF-8
    #[error("Decrypted payload is not valid UTF-8")]
    NotUtf8,

    /// Password was empty
    #[error("Password is empty")]
    EmptyPassword,

    /// System randomness or cipher setup failed
    #[error("Cryptographic failure: {0}")]
    Crypto(String),
}

fn derive_key(password: &str, salt: &[u8]) -> Result<LessSafeKey, SecretError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        salt,
        password.as_bytes(),
        &mut key,
    );

    let unbound = UnboundKey::new(&AES_256_GCM, &key)
        .map_err(|_| SecretError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt a plaintext document with a password
pub fn encrypt(plaintext: &str, password: &str) -> Result<String, SecretError> {
    if password.is_empty() {
        return Err(SecretError::EmptyPassword);
    }

    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut salt)
        .map_err(|_| SecretError::Crypto("failed to generate salt".to_string()))?;
    rng.fill(&mut nonce)
        .map_err(|_| SecretError::Crypto("failed to generate nonce".to_string()))?;

    let key = derive_key(password, &salt)?;
    let mut in_out = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| SecretError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let mut payload = Vec::with_capacity(SALT_LEN + NONCE_LEN + in_out.len());
    payload.extend_from_slice(&salt);
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&in_out);

    Ok(BASE64.encode(payload))
}

/// Decrypt a document produced by [`encrypt`]
pub fn decrypt(encoded: &str, password: &str) -> Result<String, SecretError> {
    if password.is_empty() {
        return Err(SecretError::EmptyPassword);
    }

    let payload = BASE64.decode(encoded.trim())?;
    if payload.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(SecretError::Truncated(payload.len()));
    }

    let (salt, rest) = payload.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| SecretError::Crypto("invalid nonce length".to_string()))?;

    let key = derive_key(password, salt)?;
    let mut in_out = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| SecretError::Authentication)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| SecretError::NotUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypts_what_it_encrypts() {
        let document = "[telegram]\nbot_token = \"123:abc\"\n";
        let encoded = encrypt(document, "hunter2").unwrap();

        assert_ne!(encoded, document);
        assert_eq!(decrypt(&encoded, "hunter2").unwrap(), document);
    }

    #[test]
    fn test_fresh_salt_per_encryption() {
        let a = encrypt("same", "pw").unwrap();
        let b = encrypt("same", "pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_password() {
        let encoded = encrypt("secret", "right").unwrap();
        assert!(matches!(
            decrypt(&encoded, "wrong"),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn test_tampered_payload() {
        let encoded = encrypt("secret", "pw").unwrap();
        let mut raw = BASE64.decode(&encoded).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        assert!(matches!(
            decrypt(&BASE64.encode(raw), "pw"),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn test_truncated_and_malformed_input() {
        assert!(matches!(
            decrypt(&BASE64.encode([0u8; 20]), "pw"),
            Err(SecretError::Truncated(20))
        ));
        assert!(matches!(
            decrypt("not base64!!", "pw"),
            Err(SecretError::Encoding(_))
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let encoded = encrypt("value", "pw").unwrap();
        assert_eq!(decrypt(&format!("\n{encoded}\n"), "pw").unwrap(), "value");
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(encrypt("x", ""), Err(SecretError::EmptyPassword)));
    }
}
