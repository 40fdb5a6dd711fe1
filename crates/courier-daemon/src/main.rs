//! # courier-daemon
//!
//! The Courier relay daemon: a long-running listener that accepts
//! connections from known peers, stores messages addressed to this node and
//! re-floods messages addressed to other peers.  Started directly or as a
//! subprocess of `courier daemon up`.

mod config;
mod handler;
mod listener;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_net::{Transmitter, DEFAULT_PORT};
use courier_store::Database;

use crate::config::DaemonConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_daemon=debug")),
        )
        .init();

    info!("Starting Courier relay daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = DaemonConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let local_id = db.ensure_local_peer_id()?;
    let store = Arc::new(Mutex::new(db));

    let transmitter = Arc::new(Transmitter::new(
        store.clone(),
        local_id.clone(),
        DEFAULT_PORT,
        config.net_timeout,
    ));

    let tcp = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, peer_id = %local_id, "relay daemon listening");

    // `daemon down` delivers SIGTERM; an interactive run stops on Ctrl+C.
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    };

    listener::serve(tcp, store, transmitter, &config, shutdown).await
}
