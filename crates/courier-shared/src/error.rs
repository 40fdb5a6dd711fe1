use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid key length: expected 32 bytes")]
    InvalidKeyLength,
}

/// Errors from envelope (de)serialization.  Distinct from [`CryptoError`]:
/// the codec only ever runs on plaintext obtained after decryption.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid body encoding: {0}")]
    Body(#[from] base64::DecodeError),
}
