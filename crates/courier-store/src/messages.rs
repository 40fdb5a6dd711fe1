//! CRUD operations for the message log.
//!
//! `seq` is assigned by SQLite and strictly increasing; incremental reads
//! resume from the cursor setting via [`Database::fetch_messages_since`].

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{NewMessage, StoredMessage};

impl Database {
    /// Insert a message and return its storage-assigned sequence number.
    pub fn insert_message(&self, message: &NewMessage) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO messages (msg_id, created_at, sender, body, received, seen, decrypted)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                message.msg_id,
                Utc::now().to_rfc3339(),
                message.sender,
                message.body,
                message.received,
                message.decrypted,
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Whether any stored message carries this msg_id.  Best-effort dedup
    /// for envelopes arriving twice via different relay paths.
    pub fn message_exists(&self, msg_id: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE msg_id = ?1",
            params![msg_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The most recent `limit` messages, returned in insertion order.
    pub fn fetch_recent_messages(&self, limit: u32) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT seq, msg_id, created_at, sender, body, received, seen, decrypted
             FROM messages
             ORDER BY seq DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }

    /// Messages with `seq` strictly greater than `cursor`, ascending.
    pub fn fetch_messages_since(&self, cursor: i64) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT seq, msg_id, created_at, sender, body, received, seen, decrypted
             FROM messages
             WHERE seq > ?1
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![cursor], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Mark every message up to and including `seq` as seen by the operator.
    pub fn mark_seen_through(&self, seq: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE messages SET seen = 1 WHERE seq <= ?1",
            params![seq],
        )?;
        Ok(())
    }
}

/// Map a `rusqlite::Row` to a [`StoredMessage`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let created_str: String = row.get(2)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredMessage {
        seq: row.get(0)?,
        msg_id: row.get(1)?,
        created_at,
        sender: row.get(3)?,
        body: row.get(4)?,
        received: row.get(5)?,
        seen: row.get(6)?,
        decrypted: row.get(7)?,
    })
}
