//! The wire envelope and its codec.
//!
//! An envelope is a tagged variant so dispatch on the receiving side is
//! exhaustive: a `MESSAGE` carries a body, an `ACK` does not and its body
//! key must round-trip as absent, not as an empty string.  The plaintext
//! encoding is JSON with the keys `id`, `type`, `from`, `to`, `body` and
//! `chain`; `chain` is the ordered list of peer ids that have relayed the
//! envelope and always contains at least the originator.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodecError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "MESSAGE")]
    Message {
        id: String,
        from: String,
        to: String,
        /// Base64 of the body ciphertext, encrypted end-to-end under the
        /// destination peer's key.
        body: String,
        chain: Vec<String>,
    },

    #[serde(rename = "ACK")]
    Ack {
        id: String,
        from: String,
        to: String,
        chain: Vec<String>,
    },
}

impl Envelope {
    /// Build a fresh `MESSAGE` envelope originating at `from`.
    ///
    /// The id is a new unique identifier, stable across relay hops; the
    /// chain starts with the originator alone.
    pub fn new_message(from: &str, to: &str, body_ciphertext: &[u8]) -> Self {
        Envelope::Message {
            id: Uuid::new_v4().simple().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            body: BASE64.encode(body_ciphertext),
            chain: vec![from.to_string()],
        }
    }

    /// Build the acknowledgment for a delivered message: same id, addressed
    /// back to the originator.
    pub fn ack_for(message_id: &str, local_id: &str, originator: &str) -> Self {
        Envelope::Ack {
            id: message_id.to_string(),
            from: local_id.to_string(),
            to: originator.to_string(),
            chain: vec![local_id.to_string()],
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Envelope::Message { id, .. } | Envelope::Ack { id, .. } => id,
        }
    }

    /// The originating peer id, not the relaying hop.
    pub fn from_id(&self) -> &str {
        match self {
            Envelope::Message { from, .. } | Envelope::Ack { from, .. } => from,
        }
    }

    pub fn to_id(&self) -> &str {
        match self {
            Envelope::Message { to, .. } | Envelope::Ack { to, .. } => to,
        }
    }

    pub fn chain(&self) -> &[String] {
        match self {
            Envelope::Message { chain, .. } | Envelope::Ack { chain, .. } => chain,
        }
    }

    /// Whether `peer_id` has already relayed this envelope.
    pub fn visited(&self, peer_id: &str) -> bool {
        self.chain().iter().any(|hop| hop == peer_id)
    }

    /// Append a relay hop to the chain.  Each relaying node appends exactly
    /// its own peer id before re-sending.
    pub fn push_hop(&mut self, peer_id: &str) {
        match self {
            Envelope::Message { chain, .. } | Envelope::Ack { chain, .. } => {
                chain.push(peer_id.to_string())
            }
        }
    }

    /// Decode the `MESSAGE` body into raw ciphertext bytes.  `None` for ACKs.
    pub fn body_ciphertext(&self) -> Option<Result<Vec<u8>, CodecError>> {
        match self {
            Envelope::Message { body, .. } => {
                Some(BASE64.decode(body).map_err(CodecError::Body))
            }
            Envelope::Ack { .. } => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }
}
