//! The `peer` subcommands: add, show, edit.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use courier_shared::crypto;
use courier_store::{Database, Peer, StoreError};

pub fn add(
    db: &Database,
    peer_id: &str,
    name: &str,
    address: &str,
    key: Option<String>,
    key_file: Option<PathBuf>,
    auto: bool,
) -> Result<()> {
    let sources = [key.is_some(), key_file.is_some(), auto]
        .iter()
        .filter(|&&set| set)
        .count();
    if sources != 1 {
        bail!("Pass exactly one of '--key', '--key-file' and '--auto'");
    }

    let key = if auto {
        let key = crypto::generate_key();
        println!("Generated key for {name}: {}", crypto::key_to_hex(&key));
        println!("Share it with this peer out-of-band.");
        key
    } else {
        let hex = match key_file {
            Some(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("could not read key file {}", path.display()))?,
            None => key.unwrap_or_default(),
        };
        crypto::key_from_hex(&hex).context("key must be 64 hex characters")?
    };

    db.insert_peer(&Peer {
        peer_id: peer_id.to_string(),
        name: name.to_string(),
        address: Some(address.to_string()),
        key: Some(key),
    })?;
    println!("Added peer '{name}'");
    Ok(())
}

pub fn show(db: &Database, name: Option<&str>, show_key: bool) -> Result<()> {
    let peers = match name {
        None => db.list_peers()?,
        Some(name) => match db.get_peer_by_name(name) {
            Ok(peer) => vec![peer],
            Err(StoreError::NotFound) => {
                println!("Could not find peer '{name}'");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        },
    };

    if peers.is_empty() {
        println!("No peers registered");
        return Ok(());
    }

    println!(
        "{:<34} {:<20} {:<22} {}",
        "Peer ID", "Name", "Address", "Key"
    );
    for peer in peers {
        println!(
            "{:<34} {:<20} {:<22} {}",
            peer.peer_id,
            peer.name,
            peer.address.as_deref().unwrap_or("-"),
            render_key(&peer, show_key),
        );
    }
    Ok(())
}

pub fn edit(
    db: &Database,
    name: &str,
    id: Option<String>,
    new_name: Option<String>,
    address: Option<String>,
    key: Option<String>,
) -> Result<()> {
    let mut peer = match db.get_peer_by_name(name) {
        Ok(peer) => peer,
        Err(StoreError::NotFound) => {
            println!("No such peer '{name}'");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(id) = id {
        peer.peer_id = id;
    }
    if let Some(new_name) = new_name {
        peer.name = new_name;
    }
    if let Some(address) = address {
        peer.address = Some(address);
    }
    if let Some(key) = key {
        peer.key = Some(crypto::key_from_hex(&key).context("key must be 64 hex characters")?);
    }

    db.update_peer(name, &peer)?;
    println!("Updated peer '{}'", peer.name);
    Ok(())
}

fn render_key(peer: &Peer, show_key: bool) -> String {
    match (&peer.key, show_key) {
        (None, _) => "-".to_string(),
        (Some(key), true) => crypto::key_to_hex(key),
        (Some(_), false) => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_shared::crypto::generate_key;

    #[test]
    fn key_is_masked_unless_revealed() {
        let peer = Peer {
            peer_id: "p1".into(),
            name: "alice".into(),
            address: None,
            key: Some(generate_key()),
        };

        assert_eq!(render_key(&peer, false), "***");
        assert_eq!(render_key(&peer, true).len(), 64);
        assert_eq!(render_key(&Peer::placeholder("p2"), true), "-");
    }
}
