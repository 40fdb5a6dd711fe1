use std::time::Duration;

use thiserror::Error;

use courier_shared::{CodecError, CryptoError};
use courier_store::StoreError;

/// Errors from the wire layer.  Connect and read failures are reported, not
/// retried, here; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Peer '{0}' has no encryption key")]
    MissingKey(String),

    #[error("Peer '{0}' has no network address")]
    MissingAddress(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
