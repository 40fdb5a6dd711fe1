//! # courier-store
//!
//! Local persistent state for a Courier node, backed by SQLite.
//!
//! Three collections: settings (node identity, read cursor, daemon pid),
//! the peer registry, and the message log.  The crate exposes a synchronous
//! [`Database`] handle wrapping a `rusqlite::Connection` with typed CRUD
//! helpers per collection.  Every write is a single atomic statement; the
//! core never needs multi-statement transactions.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod peers;
pub mod settings;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
