//! # courier-shared
//!
//! Types shared by every Courier crate: the wire envelope and its codec,
//! the per-peer symmetric cipher, and the error types both produce.
//!
//! The envelope is the single unit exchanged between nodes.  On the wire it
//! travels as JSON encrypted under the key shared with the peer on the other
//! end of the connection; a `MESSAGE` body is additionally encrypted
//! end-to-end under the destination peer's key, so relaying nodes never see
//! plaintext.

pub mod crypto;
pub mod envelope;

mod error;

pub use envelope::Envelope;
pub use error::{CodecError, CryptoError};
