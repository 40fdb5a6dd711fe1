//! Courier CLI
//!
//! Operator front end for a Courier node: manage the local store and peer
//! registry, control the relay daemon, send messages and read the inbox.
//!
//! ## Usage
//!
//! ```bash
//! # Create the local store and node identity
//! courier init
//!
//! # Register a peer with a freshly generated key
//! courier peer add 4f1c bob 192.168.1.20 --auto
//!
//! # Start / stop the relay daemon
//! courier daemon up
//! courier daemon down
//!
//! # Send a message and read the inbox
//! courier message send bob "hello"
//! courier message read
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use courier_store::Database;

/// Courier - peer-to-peer encrypted messaging relay
#[derive(Parser)]
#[command(name = "courier", version, about = "Peer-to-peer encrypted messaging relay")]
struct Cli {
    /// Explicit database path (default: platform data directory)
    #[arg(long, global = true, env = "COURIER_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the local store and node identity
    Init,

    /// Drop all peers and messages, keeping the node identity
    Purge,

    /// Manage the node identity
    Id {
        #[command(subcommand)]
        action: IdAction,
    },

    /// Control the relay daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Manage peers
    Peer {
        #[command(subcommand)]
        action: PeerAction,
    },

    /// Send and read messages
    Message {
        #[command(subcommand)]
        action: MessageAction,
    },
}

#[derive(Subcommand)]
enum IdAction {
    /// Print this node's peer id
    Show,
    /// Overwrite this node's peer id
    Set { id: String },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the relay daemon as a background process
    Up,
    /// Stop the running relay daemon
    Down,
}

#[derive(Subcommand)]
enum PeerAction {
    /// Register a peer
    Add {
        peer_id: String,
        name: String,
        /// Host or host:port of the peer's daemon
        address: String,
        /// Hex-encoded key for this peer (excludes --key-file and --auto)
        #[arg(long)]
        key: Option<String>,
        /// Path to a file holding the hex key (excludes --key and --auto)
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Generate a fresh key and print it
        #[arg(long)]
        auto: bool,
    },
    /// Show one peer or the full registry
    Show {
        name: Option<String>,
        /// Reveal key material instead of masking it
        #[arg(long)]
        show_key: bool,
    },
    /// Edit fields of an existing peer
    Edit {
        name: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long = "name")]
        new_name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },
}

#[derive(Subcommand)]
enum MessageAction {
    /// Send a message to a named peer
    Send { name: String, body: String },
    /// Read the inbox, resuming from the cursor
    Read {
        /// Ignore the cursor and list the most recent messages
        #[arg(short, long)]
        all: bool,
        /// Bound for --all
        #[arg(long)]
        limit: Option<u32>,
    },
}

fn open_database(path: &Option<PathBuf>) -> Result<Database> {
    Ok(match path {
        Some(p) => Database::open_at(p)?,
        None => Database::new()?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let db = open_database(&cli.db)?;

    match cli.command {
        Command::Init => commands::identity::init(&db),
        Command::Purge => commands::identity::purge(&db),
        Command::Id { action } => match action {
            IdAction::Show => commands::identity::show(&db),
            IdAction::Set { id } => commands::identity::set(&db, &id),
        },
        Command::Daemon { action } => match action {
            DaemonAction::Up => commands::daemon::up(&db, cli.db.as_deref()),
            DaemonAction::Down => commands::daemon::down(&db),
        },
        Command::Peer { action } => match action {
            PeerAction::Add {
                peer_id,
                name,
                address,
                key,
                key_file,
                auto,
            } => commands::peers::add(&db, &peer_id, &name, &address, key, key_file, auto),
            PeerAction::Show { name, show_key } => {
                commands::peers::show(&db, name.as_deref(), show_key)
            }
            PeerAction::Edit {
                name,
                id,
                new_name,
                address,
                key,
            } => commands::peers::edit(&db, &name, id, new_name, address, key),
        },
        Command::Message { action } => match action {
            MessageAction::Send { name, body } => {
                commands::messaging::send(db, &name, &body).await
            }
            MessageAction::Read { all, limit } => commands::messaging::read(&db, all, limit),
        },
    }
}
