//! The `message` subcommands: send and read.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::Mutex;

use courier_net::{Transmitter, DEFAULT_PORT};
use courier_store::{Database, NewMessage, StoredMessage, StoreError};

const DEFAULT_NET_TIMEOUT_SECS: u64 = 5;

/// Send-side network timeout.  Reads the same `COURIER_NET_TIMEOUT_SECS`
/// knob the daemon honors so both halves of a node time out alike.
fn net_timeout() -> Duration {
    timeout_from(std::env::var("COURIER_NET_TIMEOUT_SECS").ok().as_deref())
}

fn timeout_from(raw: Option<&str>) -> Duration {
    let secs = match raw {
        Some(val) => match val.parse::<u64>() {
            Ok(secs) => secs,
            Err(_) => {
                tracing::warn!(value = %val, "Invalid COURIER_NET_TIMEOUT_SECS, using default");
                DEFAULT_NET_TIMEOUT_SECS
            }
        },
        None => DEFAULT_NET_TIMEOUT_SECS,
    };
    Duration::from_secs(secs)
}

/// Send `body` to the peer named `name`: build the envelope, flood it to
/// every known peer and keep a local copy of the sent message.
pub async fn send(db: Database, name: &str, body: &str) -> Result<()> {
    let target = match db.get_peer_by_name(name) {
        Ok(peer) => peer,
        Err(StoreError::NotFound) => {
            println!("Could not find peer '{name}'");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let local_id = db.ensure_local_peer_id()?;

    let store = Arc::new(Mutex::new(db));
    let transmitter =
        Transmitter::new(store.clone(), local_id.clone(), DEFAULT_PORT, net_timeout());

    let (msg_id, delivered) = transmitter.transmit(&target, body).await?;

    // Keep the author's copy; `received` marks inbound storage and stays
    // false on locally authored messages.
    store.lock().await.insert_message(&NewMessage {
        msg_id,
        sender: local_id,
        body: body.to_string(),
        received: false,
        decrypted: true,
    })?;

    if delivered == 0 {
        println!("Could not transmit the message to anybody");
    } else {
        println!("Transmitted message to {delivered} peers");
    }
    Ok(())
}

/// Read the inbox: by default everything past the cursor, with `--all` the
/// most recent `--limit` messages.  Only the cursor path advances the
/// cursor and marks rows as seen; `--all` is a read-only peek, since its
/// window may skip older messages that were never rendered.
pub fn read(db: &Database, all: bool, limit: Option<u32>) -> Result<()> {
    let messages = if all {
        let Some(limit) = limit else {
            bail!("You need to specify '--limit' with '--all'");
        };
        db.fetch_recent_messages(limit)?
    } else {
        db.fetch_messages_since(db.message_cursor()?)?
    };

    if messages.is_empty() {
        println!("No messages");
        return Ok(());
    }

    render_table(&messages);

    if !all {
        let last_seq = messages.last().map(|m| m.seq).unwrap_or_default();
        db.set_message_cursor(last_seq)?;
        db.mark_seen_through(last_seq)?;
    }
    Ok(())
}

fn render_table(messages: &[StoredMessage]) {
    println!(
        "{:<5} {:<34} {:<34} {:<26} {:<8} {:<5} {}",
        "Seq", "ID", "Sender", "Created At", "Received", "Seen", "Decrypted"
    );
    for m in messages {
        println!(
            "{:<5} {:<34} {:<34} {:<26} {:<8} {:<5} {}",
            m.seq,
            m.msg_id,
            m.sender,
            m.created_at.to_rfc3339(),
            sign(m.received),
            sign(m.seen),
            sign(m.decrypted),
        );
        println!("      {}", m.body);
    }
}

fn sign(flag: bool) -> &'static str {
    if flag {
        "\u{2714}"
    } else {
        "\u{00d7}"
    }
}
