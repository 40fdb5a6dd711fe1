//! CRUD operations for [`Peer`] records.
//!
//! The registry is keyed by `peer_id`; the network address is a mutable,
//! optional attribute and is never used as a primary key.

use rusqlite::params;

use courier_shared::crypto;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Peer;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new peer.  Fails on a duplicate id or display name.
    pub fn insert_peer(&self, peer: &Peer) -> Result<()> {
        self.conn().execute(
            "INSERT INTO peers (peer_id, name, address, key)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                peer.peer_id,
                peer.name,
                peer.address,
                peer.key.as_ref().map(crypto::key_to_hex),
            ],
        )?;
        Ok(())
    }

    /// Resolve a peer by id, auto-registering a placeholder record when the
    /// id is unknown.  Called once per inbound envelope so messages from a
    /// sender are attributable before any key exchange happens out-of-band.
    pub fn resolve_or_create_peer(&self, peer_id: &str) -> Result<Peer> {
        match self.get_peer_by_id(peer_id) {
            Ok(peer) => Ok(peer),
            Err(StoreError::NotFound) => {
                let peer = Peer::placeholder(peer_id);
                self.insert_peer(&peer)?;
                tracing::info!(peer_id, "auto-registered unknown sender");
                Ok(peer)
            }
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_peer_by_id(&self, peer_id: &str) -> Result<Peer> {
        self.conn()
            .query_row(
                "SELECT peer_id, name, address, key FROM peers WHERE peer_id = ?1",
                params![peer_id],
                row_to_peer,
            )
            .map_err(not_found)
    }

    pub fn get_peer_by_name(&self, name: &str) -> Result<Peer> {
        self.conn()
            .query_row(
                "SELECT peer_id, name, address, key FROM peers WHERE name = ?1",
                params![name],
                row_to_peer,
            )
            .map_err(not_found)
    }

    /// Look up a peer by the host part of its address.  Matches both bare
    /// hosts and `host:port` entries.
    pub fn get_peer_by_address(&self, host: &str) -> Result<Peer> {
        self.conn()
            .query_row(
                "SELECT peer_id, name, address, key FROM peers
                 WHERE address = ?1 OR address LIKE ?1 || ':%'",
                params![host],
                row_to_peer,
            )
            .map_err(not_found)
    }

    /// List all peers, ordered by display name.
    pub fn list_peers(&self) -> Result<Vec<Peer>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT peer_id, name, address, key FROM peers ORDER BY name ASC")?;

        let rows = stmt.query_map([], row_to_peer)?;

        let mut peers = Vec::new();
        for row in rows {
            peers.push(row?);
        }
        Ok(peers)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the peer currently named `name` with `peer`.
    pub fn update_peer(&self, name: &str, peer: &Peer) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE peers SET peer_id = ?2, name = ?3, address = ?4, key = ?5
             WHERE name = ?1",
            params![
                name,
                peer.peer_id,
                peer.name,
                peer.address,
                peer.key.as_ref().map(crypto::key_to_hex),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`Peer`].
fn row_to_peer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Peer> {
    let peer_id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let address: Option<String> = row.get(2)?;
    let key_hex: Option<String> = row.get(3)?;

    let key = key_hex
        .map(|k| crypto::key_from_hex(&k))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Peer {
        peer_id,
        name,
        address,
        key,
    })
}
