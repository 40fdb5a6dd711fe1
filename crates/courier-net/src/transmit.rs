//! The flooding relay algorithm.
//!
//! Delivery is at-least-once and best-effort: an outbound or relayed
//! envelope is sent to every known peer over a fresh connection each, a
//! per-peer failure is logged and skipped, and the success count is
//! advisory telemetry for the caller, not a delivery guarantee.  There is
//! no routing table; eventual delivery comes from every node re-flooding
//! envelopes that are not addressed to it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use courier_shared::crypto;
use courier_shared::Envelope;
use courier_store::{Database, Peer};

use crate::channel::Channel;
use crate::error::NetError;

pub struct Transmitter {
    store: Arc<Mutex<Database>>,
    local_id: String,
    default_port: u16,
    timeout: Duration,
}

impl Transmitter {
    pub fn new(
        store: Arc<Mutex<Database>>,
        local_id: String,
        default_port: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            local_id,
            default_port,
            timeout,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Send a fresh message to `target`: encrypt the body end-to-end under
    /// the target's key, then flood the envelope to every known peer.
    ///
    /// Returns the new message id and the number of peers reached.
    pub async fn transmit(&self, target: &Peer, body: &str) -> Result<(String, usize), NetError> {
        let target_key = target
            .key
            .as_ref()
            .ok_or_else(|| NetError::MissingKey(target.name.clone()))?;
        let body_ciphertext = crypto::encrypt(target_key, body.as_bytes())?;

        let envelope = Envelope::new_message(&self.local_id, &target.peer_id, &body_ciphertext);
        let delivered = self.send_to_every_peer(&envelope).await?;
        Ok((envelope.id().to_string(), delivered))
    }

    /// Relay an envelope this node is not the final destination of: append
    /// the local hop to the chain and flood onward.
    pub async fn retransmit(&self, envelope: &mut Envelope) -> Result<usize, NetError> {
        envelope.push_hop(&self.local_id);
        self.send_to_every_peer(envelope).await
    }

    /// Fire-and-forget acknowledgment for a delivered message, sent back to
    /// the originator over a single direct connection.
    pub async fn send_ack(&self, originator: &Peer, message_id: &str) -> Result<(), NetError> {
        let ack = Envelope::ack_for(message_id, &self.local_id, &originator.peer_id);
        self.send_one(originator, &ack).await
    }

    /// Flood `envelope` to the full peer registry.
    ///
    /// Sends run concurrently with no defined completion order and no
    /// atomicity across the set; one unreachable peer never aborts delivery
    /// to the rest.  Returns the count of successful sends.
    pub async fn send_to_every_peer(&self, envelope: &Envelope) -> Result<usize, NetError> {
        let peers = {
            let store = self.store.lock().await;
            store.list_peers()?
        };

        let sends = peers
            .iter()
            .filter(|peer| peer.peer_id != self.local_id)
            .map(|peer| self.send_one(peer, envelope));
        let results = futures::future::join_all(sends).await;

        let mut delivered = 0;
        for (peer, result) in peers
            .iter()
            .filter(|peer| peer.peer_id != self.local_id)
            .zip(results)
        {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    peer = %peer.name,
                    error = %e,
                    "cannot reach peer, skipping"
                ),
            }
        }

        tracing::info!(envelope_id = %envelope.id(), delivered, "flooded envelope");
        Ok(delivered)
    }

    /// One send over one fresh connection, encrypted under the link peer's
    /// key.  Keyless or address-less peers cannot be reached.
    async fn send_one(&self, peer: &Peer, envelope: &Envelope) -> Result<(), NetError> {
        let key = peer
            .key
            .ok_or_else(|| NetError::MissingKey(peer.name.clone()))?;
        let addr = self.target_addr(peer)?;

        let channel = Channel::connect(&addr, key, self.timeout).await?;
        channel.send(envelope).await
    }

    /// The socket address of a peer's daemon: a bare host gets the default
    /// port appended, `host:port` entries are used verbatim.
    fn target_addr(&self, peer: &Peer) -> Result<String, NetError> {
        let address = peer
            .address
            .as_deref()
            .ok_or_else(|| NetError::MissingAddress(peer.name.clone()))?;

        if address.contains(':') {
            Ok(address.to_string())
        } else {
            Ok(format!("{address}:{}", self.default_port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_shared::crypto::{decrypt, generate_key, SymmetricKey};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn open_store() -> (tempfile::TempDir, Arc<Mutex<Database>>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, Arc::new(Mutex::new(db)))
    }

    fn peer(id: &str, addr: Option<String>, key: Option<SymmetricKey>) -> Peer {
        Peer {
            peer_id: id.to_string(),
            name: id.to_string(),
            address: addr,
            key,
        }
    }

    /// Listener that reads one raw payload to end-of-stream and forwards it.
    async fn spawn_sink(tx: mpsc::UnboundedSender<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).await.unwrap();
                let _ = tx.send(buf);
            }
        });
        addr
    }

    #[tokio::test]
    async fn partial_failure_returns_reachable_count() {
        let (_dir, store) = open_store();
        let (tx, _rx) = mpsc::unbounded_channel();
        let key = generate_key();

        // Two reachable peers.
        for i in 0..2 {
            let addr = spawn_sink(tx.clone()).await;
            store
                .lock()
                .await
                .insert_peer(&peer(&format!("up{i}"), Some(addr), Some(key)))
                .unwrap();
        }

        // One peer that refuses connections.
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap().to_string();
        drop(dead);
        store
            .lock()
            .await
            .insert_peer(&peer("down", Some(dead_addr), Some(key)))
            .unwrap();

        // One keyless peer, skipped entirely.
        store
            .lock()
            .await
            .insert_peer(&peer("nokey", Some("127.0.0.1".into()), None))
            .unwrap();

        let tx = Transmitter::new(store, "local".into(), crate::DEFAULT_PORT, TIMEOUT);
        let envelope = Envelope::new_message("local", "up0", b"ct");

        let delivered = tx.send_to_every_peer(&envelope).await.unwrap();
        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn transmit_encrypts_per_link_and_end_to_end() {
        let (_dir, store) = open_store();
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();

        let link_key = generate_key();
        let addr = spawn_sink(raw_tx).await;
        let target = peer("bob", Some(addr), Some(link_key));
        store.lock().await.insert_peer(&target).unwrap();

        let tx = Transmitter::new(store, "alice".into(), crate::DEFAULT_PORT, TIMEOUT);
        let (msg_id, delivered) = tx.transmit(&target, "hello").await.unwrap();
        assert_eq!(delivered, 1);

        // Outer layer: wire ciphertext under the link key.
        let wire = raw_rx.recv().await.unwrap();
        let envelope = Envelope::from_bytes(&decrypt(&link_key, &wire).unwrap()).unwrap();
        assert_eq!(envelope.id(), msg_id);
        assert_eq!(envelope.from_id(), "alice");
        assert_eq!(envelope.to_id(), "bob");
        assert_eq!(envelope.chain(), &["alice".to_string()]);

        // Inner layer: body ciphertext under the target's key.
        let body_ct = envelope.body_ciphertext().unwrap().unwrap();
        assert_eq!(decrypt(&link_key, &body_ct).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn retransmit_appends_local_hop() {
        let (_dir, store) = open_store();
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();

        let link_key = generate_key();
        let addr = spawn_sink(raw_tx).await;
        store
            .lock()
            .await
            .insert_peer(&peer("carol", Some(addr), Some(link_key)))
            .unwrap();

        let tx = Transmitter::new(store, "bob".into(), crate::DEFAULT_PORT, TIMEOUT);
        let mut envelope = Envelope::new_message("alice", "carol", b"ct");

        let delivered = tx.retransmit(&mut envelope).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(envelope.chain(), &["alice".to_string(), "bob".to_string()]);

        let wire = raw_rx.recv().await.unwrap();
        let relayed = Envelope::from_bytes(&decrypt(&link_key, &wire).unwrap()).unwrap();
        assert_eq!(relayed.chain(), envelope.chain());
    }

    #[tokio::test]
    async fn transmit_to_keyless_target_fails() {
        let (_dir, store) = open_store();
        let target = peer("nokey", Some("127.0.0.1".into()), None);

        let tx = Transmitter::new(store, "alice".into(), crate::DEFAULT_PORT, TIMEOUT);
        let result = tx.transmit(&target, "hello").await;
        assert!(matches!(result, Err(NetError::MissingKey(_))));
    }
}
