//! Key/value settings: node identity, read cursor and daemon pid.
//!
//! `upsert_setting` is keyed by name with last-write-wins semantics; each
//! upsert is one atomic statement.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// This node's own peer id, generated once at first run.
pub const PEER_ID: &str = "peer_id";
/// Sequence number of the last message consumed by the read path.
pub const CURSOR: &str = "cursor";
/// Pid of the running daemon process, if any.
pub const DAEMON: &str = "daemon";

impl Database {
    /// Insert or replace a setting.
    pub fn upsert_setting(&self, name: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = ?2",
            params![name, value],
        )?;
        Ok(())
    }

    /// Fetch a setting, `None` if it was never written.
    pub fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                params![name],
                |row| row.get(0),
            );
        match value {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Delete a setting.  Returns `true` if a row was deleted.
    pub fn delete_setting(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM settings WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Typed helpers
    // ------------------------------------------------------------------

    /// This node's peer id, if an identity has been established.
    pub fn local_peer_id(&self) -> Result<Option<String>> {
        self.get_setting(PEER_ID)
    }

    /// Return the node identity, generating and persisting a fresh one on
    /// first call.
    pub fn ensure_local_peer_id(&self) -> Result<String> {
        if let Some(id) = self.get_setting(PEER_ID)? {
            return Ok(id);
        }
        let id = Uuid::new_v4().simple().to_string();
        self.upsert_setting(PEER_ID, &id)?;
        tracing::info!(peer_id = %id, "generated node identity");
        Ok(id)
    }

    /// Overwrite the node identity.
    pub fn set_local_peer_id(&self, id: &str) -> Result<()> {
        self.upsert_setting(PEER_ID, id)
    }

    /// The read cursor; zero when no message has been consumed yet.
    pub fn message_cursor(&self) -> Result<i64> {
        match self.get_setting(CURSOR)? {
            None => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::InvalidSetting(CURSOR.to_string())),
        }
    }

    pub fn set_message_cursor(&self, seq: i64) -> Result<()> {
        self.upsert_setting(CURSOR, &seq.to_string())
    }

    /// Pid of the running daemon, if one was recorded.
    pub fn daemon_pid(&self) -> Result<Option<i32>> {
        match self.get_setting(DAEMON)? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::InvalidSetting(DAEMON.to_string())),
        }
    }

    pub fn set_daemon_pid(&self, pid: i32) -> Result<()> {
        self.upsert_setting(DAEMON, &pid.to_string())
    }

    pub fn clear_daemon_pid(&self) -> Result<bool> {
        self.delete_setting(DAEMON)
    }
}
