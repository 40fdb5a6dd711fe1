//! Daemon configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the daemon can start with zero
//! configuration on a fresh node.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use courier_net::DEFAULT_PORT;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Socket address the relay listens on.
    /// Env: `COURIER_LISTEN_ADDR`
    /// Default: `0.0.0.0:7667`
    pub listen_addr: SocketAddr,

    /// Connect/read timeout for every peer connection, bounding worst-case
    /// blocking per peer.
    /// Env: `COURIER_NET_TIMEOUT_SECS`
    /// Default: 5 seconds
    pub net_timeout: Duration,

    /// Grace period for in-flight connection handlers on shutdown.
    /// Env: `COURIER_SHUTDOWN_GRACE_SECS`
    /// Default: 10 seconds
    pub shutdown_grace: Duration,

    /// Explicit database path, overriding the platform data directory.
    /// Env: `COURIER_DB`
    pub db_path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_PORT).into(),
            net_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
            db_path: None,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("COURIER_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid COURIER_LISTEN_ADDR, using default");
            }
        }

        if let Ok(val) = std::env::var("COURIER_NET_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.net_timeout = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid COURIER_NET_TIMEOUT_SECS, using default");
            }
        }

        if let Ok(val) = std::env::var("COURIER_SHUTDOWN_GRACE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.shutdown_grace = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid COURIER_SHUTDOWN_GRACE_SECS, using default");
            }
        }

        if let Ok(path) = std::env::var("COURIER_DB") {
            config.db_path = Some(PathBuf::from(path));
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
