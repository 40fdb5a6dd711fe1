//! `init`, `purge` and the `id` subcommands.

use anyhow::Result;

use courier_store::Database;

/// Create the schema (done implicitly on open) and establish the node
/// identity, generated exactly once.
pub fn init(db: &Database) -> Result<()> {
    match db.local_peer_id()? {
        Some(id) => println!("Your ID is {id}"),
        None => {
            let id = db.ensure_local_peer_id()?;
            println!("New ID was generated for you: {id}");
        }
    }
    Ok(())
}

pub fn purge(db: &Database) -> Result<()> {
    db.purge()?;
    println!("Purged peers, messages and cursor");
    Ok(())
}

pub fn show(db: &Database) -> Result<()> {
    match db.local_peer_id()? {
        Some(id) => println!("{id}"),
        None => println!("No identity yet, run 'courier init'"),
    }
    Ok(())
}

pub fn set(db: &Database, id: &str) -> Result<()> {
    db.set_local_peer_id(id)?;
    println!("ID set to {id}");
    Ok(())
}
