//! Symmetric authenticated encryption, one independent key per peer.
//!
//! XChaCha20-Poly1305 with a random 24-byte nonce prepended to the
//! ciphertext.  Keys are exchanged out-of-band and stored hex-encoded.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::CryptoError;

pub const NONCE_SIZE: usize = 24;

pub type SymmetricKey = [u8; 32];

pub fn generate_key() -> SymmetricKey {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Hex-encode a key for storage or display.
pub fn key_to_hex(key: &SymmetricKey) -> String {
    hex::encode(key)
}

/// Parse a key from its 64-character hex form.
pub fn key_from_hex(s: &str) -> Result<SymmetricKey, CryptoError> {
    let bytes = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidKeyLength)?;
    let key: SymmetricKey = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let plaintext = b"store and forward";

        let encrypted = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &encrypted).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = generate_key();
        let key2 = generate_key();

        let encrypted = encrypt(&key1, b"secret").unwrap();
        assert!(decrypt(&key2, &encrypted).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = generate_key();

        let mut encrypted = encrypt(&key, b"important data").unwrap();
        let len = encrypted.len();
        encrypted[len - 1] ^= 0xFF;

        assert!(decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = generate_key();
        let encrypted = encrypt(&key, b"important data").unwrap();

        assert!(decrypt(&key, &encrypted[..NONCE_SIZE + 3]).is_err());
        assert!(decrypt(&key, &[]).is_err());
    }

    #[test]
    fn test_keys_are_independent() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_key_hex_roundtrip() {
        let key = generate_key();
        let hex = key_to_hex(&key);
        assert_eq!(hex.len(), 64);
        assert_eq!(key_from_hex(&hex).unwrap(), key);
    }

    #[test]
    fn test_key_from_bad_hex() {
        assert!(key_from_hex("abcd").is_err());
        assert!(key_from_hex("zz".repeat(32).as_str()).is_err());
    }
}
