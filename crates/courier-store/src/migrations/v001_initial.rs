//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `settings`, `peers` and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Settings (node identity, read cursor, daemon pid)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS settings (
    name  TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Peers
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS peers (
    peer_id TEXT PRIMARY KEY NOT NULL,
    name    TEXT NOT NULL UNIQUE,
    address TEXT,                          -- host or host:port, nullable
    key     TEXT                           -- hex-encoded 32-byte key, nullable
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    msg_id     TEXT NOT NULL,              -- sender-assigned, not unique
    created_at TEXT NOT NULL,              -- ISO-8601 / RFC-3339
    sender     TEXT NOT NULL,              -- originating peer_id
    body       TEXT NOT NULL,              -- plaintext or base64 ciphertext
    received   INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    seen       INTEGER NOT NULL DEFAULT 0,
    decrypted  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_msg_id ON messages(msg_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
