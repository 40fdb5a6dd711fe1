//! Domain model structs persisted in the local database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_shared::crypto::SymmetricKey;

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// A known remote participant.
///
/// `peer_id` is the durable identity; the network address is a mutable,
/// optional attribute resolved at connection time.  A peer auto-registered
/// from an inbound envelope has only an id and a name and cannot be sent
/// encrypted traffic until a key is added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peer {
    /// Stable logical identity, unique within the registry.
    pub peer_id: String,
    /// Human-readable display label, unique.
    pub name: String,
    /// Host/IP, optionally `host:port` when the peer's daemon listens on a
    /// non-default port.  Unknown until first contact.
    pub address: Option<String>,
    /// Symmetric key shared out-of-band with exactly this peer.
    pub key: Option<SymmetricKey>,
}

impl Peer {
    /// Placeholder record for a sender seen before any key exchange: id and
    /// name both set to the raw id, no key, no address.
    pub fn placeholder(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            name: peer_id.to_string(),
            address: None,
            key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A stored message, either authored locally or received from the network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    /// Storage-assigned sequence, strictly increasing.  The only safe
    /// resumption cursor; `msg_id` is not unique across the full history.
    pub seq: i64,
    /// Content identity assigned by the original sender, stable across hops.
    pub msg_id: String,
    pub created_at: DateTime<Utc>,
    /// Peer id of the originating author, not the relaying hop.
    pub sender: String,
    /// Plaintext once decrypted; base64 ciphertext if the sender's key was
    /// unknown at receipt time.
    pub body: String,
    /// Durably stored on this node.
    pub received: bool,
    /// Shown to the local operator.
    pub seen: bool,
    pub decrypted: bool,
}

/// Fields supplied when inserting a message; `seq` and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub msg_id: String,
    pub sender: String,
    pub body: String,
    pub received: bool,
    pub decrypted: bool,
}
