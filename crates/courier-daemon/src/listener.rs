//! Accept loop with graceful shutdown.
//!
//! One handler task per accepted connection; no shared mutable state across
//! connections other than the store.  On shutdown the loop stops accepting
//! and in-flight handlers get a bounded grace period before being aborted.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use courier_net::Transmitter;
use courier_store::Database;

use crate::config::DaemonConfig;
use crate::handler;

pub async fn serve(
    listener: TcpListener,
    store: Arc<Mutex<Database>>,
    transmitter: Arc<Transmitter>,
    config: &DaemonConfig,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let mut handlers = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, remote)) => {
                        tracing::debug!(%remote, "accepted connection");
                        handlers.spawn(handler::handle_connection(
                            store.clone(),
                            transmitter.clone(),
                            stream,
                            remote,
                            config.net_timeout,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    // Let in-flight handlers finish within the grace period.
    let drain = async {
        while handlers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        tracing::warn!(
            grace = ?config.shutdown_grace,
            "grace period elapsed, aborting remaining handlers"
        );
        handlers.abort_all();
    }

    tracing::info!("relay stopped");
    Ok(())
}
