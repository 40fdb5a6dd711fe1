//! Per-connection handler: the relay decision state machine.
//!
//! One handler task per accepted connection.  The flow is: resolve the
//! sending peer by its source address, read and decrypt the single inbound
//! envelope, resolve the originator by peer id (auto-registering unknown
//! ids), then branch: a message addressed to this node is decrypted and
//! persisted and acknowledged; a message for someone else is re-flooded
//! with this node appended to the chain; an acknowledgment is logged.
//!
//! Any failure is caught here, logged, and the connection dropped without a
//! reply; a malformed or hostile message never reaches the listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use courier_net::{Channel, NetError, Transmitter};
use courier_shared::{crypto, CodecError, Envelope};
use courier_store::{Database, NewMessage, Peer, StoreError};

#[derive(Error, Debug)]
pub enum HandlerError {
    /// Inbound connection from an address with no registered peer.
    #[error("No registered peer with address {0}")]
    UnknownAddress(String),

    /// The resolved peer has no key, so the payload cannot be decrypted.
    #[error("Peer '{0}' has no encryption key")]
    MissingKey(String),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Entry point spawned by the accept loop.  Catches every handler error so
/// one bad connection never affects the listener or its siblings.
pub async fn handle_connection(
    store: Arc<Mutex<Database>>,
    transmitter: Arc<Transmitter>,
    stream: TcpStream,
    remote: SocketAddr,
    timeout: Duration,
) {
    if let Err(e) = process(store, transmitter, stream, remote, timeout).await {
        tracing::warn!(%remote, error = %e, "dropping connection");
    }
}

async fn process(
    store: Arc<Mutex<Database>>,
    transmitter: Arc<Transmitter>,
    stream: TcpStream,
    remote: SocketAddr,
    timeout: Duration,
) -> Result<(), HandlerError> {
    // AWAIT_DATA: identify the sending peer by its network address.
    // Unauthenticated addresses are rejected before any byte is processed.
    let host = remote.ip().to_string();
    let link_peer = {
        let store = store.lock().await;
        match store.get_peer_by_address(&host) {
            Ok(peer) => peer,
            Err(StoreError::NotFound) => return Err(HandlerError::UnknownAddress(host)),
            Err(e) => return Err(e.into()),
        }
    };
    let link_key = link_peer
        .key
        .ok_or_else(|| HandlerError::MissingKey(link_peer.name.clone()))?;

    // DECODING: read to end-of-stream, decrypt under the link peer's key,
    // deserialize.
    let envelope = Channel::from_stream(stream, link_key, timeout)
        .receive_all()
        .await?;

    tracing::debug!(
        envelope_id = %envelope.id(),
        from = %envelope.from_id(),
        link = %link_peer.name,
        "received envelope"
    );

    dispatch(store, transmitter, envelope).await
}

/// DISPATCHING and the terminal branches.
async fn dispatch(
    store: Arc<Mutex<Database>>,
    transmitter: Arc<Transmitter>,
    envelope: Envelope,
) -> Result<(), HandlerError> {
    let local_id = transmitter.local_id().to_string();

    // Resolve the originator by peer id, auto-registering a placeholder so
    // future messages from this id are attributable before a key exchange.
    let sender = {
        let store = store.lock().await;
        store.resolve_or_create_peer(envelope.from_id())?
    };

    match envelope {
        Envelope::Ack { id, from, .. } => {
            // Terminal: delivery is fire-and-forget, unacknowledged sends
            // are not retried.
            tracing::info!(message_id = %id, from = %from, "message acknowledged");
            Ok(())
        }

        envelope @ Envelope::Message { .. } => {
            if envelope.visited(&local_id) {
                // Loop guard: this node already relayed the envelope.
                tracing::debug!(envelope_id = %envelope.id(), "already in chain, dropping");
                return Ok(());
            }

            if envelope.to_id() == local_id {
                deliver(store, transmitter, &envelope, &sender).await
            } else {
                let mut envelope = envelope;
                let relayed = transmitter.retransmit(&mut envelope).await?;
                tracing::info!(
                    envelope_id = %envelope.id(),
                    to = %envelope.to_id(),
                    relayed,
                    "relayed foreign envelope"
                );
                Ok(())
            }
        }
    }
}

/// MESSAGE_OWN: this node is the final recipient.  Decrypt the body under
/// the originator's key if one is known, persist, and acknowledge.
async fn deliver(
    store: Arc<Mutex<Database>>,
    transmitter: Arc<Transmitter>,
    envelope: &Envelope,
    sender: &Peer,
) -> Result<(), HandlerError> {
    let (id, body_b64) = match envelope {
        Envelope::Message { id, body, .. } => (id.as_str(), body.as_str()),
        Envelope::Ack { .. } => return Ok(()),
    };
    let ciphertext = match envelope.body_ciphertext() {
        Some(result) => result?,
        None => return Ok(()),
    };

    let (body, decrypted) = match sender.key.as_ref().map(|k| crypto::decrypt(k, &ciphertext)) {
        Some(Ok(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => (text, true),
            Err(_) => (body_b64.to_string(), false),
        },
        // No key, or the stored key does not match: keep the ciphertext.
        Some(Err(_)) | None => (body_b64.to_string(), false),
    };

    {
        let store = store.lock().await;
        if store.message_exists(id)? {
            // Same envelope arrived twice via different relay paths.
            tracing::debug!(message_id = %id, "duplicate message, not storing again");
        } else {
            store.insert_message(&NewMessage {
                msg_id: id.to_string(),
                sender: sender.peer_id.clone(),
                body,
                received: true,
                decrypted,
            })?;
            tracing::info!(message_id = %id, sender = %sender.name, decrypted, "stored message");
        }
    }

    // Fire-and-forget acknowledgment back to the originator.
    if let Err(e) = transmitter.send_ack(sender, id).await {
        tracing::debug!(message_id = %id, error = %e, "could not acknowledge to sender");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use courier_shared::crypto::{decrypt, encrypt, generate_key, SymmetricKey};
    use courier_net::DEFAULT_PORT;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(2);

    struct Node {
        _dir: tempfile::TempDir,
        store: Arc<Mutex<Database>>,
        transmitter: Arc<Transmitter>,
    }

    fn node(local_id: &str) -> Node {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        db.set_local_peer_id(local_id).unwrap();
        let store = Arc::new(Mutex::new(db));
        let transmitter = Arc::new(Transmitter::new(
            store.clone(),
            local_id.to_string(),
            DEFAULT_PORT,
            TIMEOUT,
        ));
        Node {
            _dir: dir,
            store,
            transmitter,
        }
    }

    /// Listener capturing every raw payload sent to it.
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

    async fn add_peer(node: &Node, id: &str, addr: Option<String>, key: Option<SymmetricKey>) {
        node.store
            .lock()
            .await
            .insert_peer(&Peer {
                peer_id: id.to_string(),
                name: id.to_string(),
                address: addr,
                key,
            })
            .unwrap();
    }

    /// Run the full handler against an envelope arriving over a real socket
    /// from `127.0.0.1`, encrypted under `link_key`.
    async fn run_handler(node: &Node, link_key: SymmetricKey, envelope: &Envelope) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let store = node.store.clone();
        let transmitter = node.transmitter.clone();
        let server = tokio::spawn(async move {
            let (stream, remote) = listener.accept().await.unwrap();
            handle_connection(store, transmitter, stream, remote, TIMEOUT).await;
        });

        // A rejecting handler may close before the payload is read; the
        // sender only sees that as a broken connection.
        let chan = Channel::connect(&addr, link_key, TIMEOUT).await.unwrap();
        let _ = chan.send(envelope).await;

        server.await.unwrap();
    }

    #[tokio::test]
    async fn direct_delivery_stores_and_acks() {
        let b = node("b");
        let key_ab = generate_key();

        // A is reachable for the acknowledgment.
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let addr_a = spawn_sink(ack_tx).await;
        add_peer(&b, "a", Some(addr_a), Some(key_ab)).await;

        let body_ct = encrypt(&key_ab, b"hello").unwrap();
        let envelope = Envelope::Message {
            id: "m1".into(),
            from: "a".into(),
            to: "b".into(),
            body: BASE64.encode(&body_ct),
            chain: vec!["a".into()],
        };

        run_handler(&b, key_ab, &envelope).await;

        let stored = b.store.lock().await.fetch_messages_since(0).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].msg_id, "m1");
        assert_eq!(stored[0].sender, "a");
        assert_eq!(stored[0].body, "hello");
        assert!(stored[0].decrypted);
        assert!(stored[0].received);

        // A got an ACK with the same id, addressed back to it.
        let wire = ack_rx.recv().await.unwrap();
        let ack = Envelope::from_bytes(&decrypt(&key_ab, &wire).unwrap()).unwrap();
        assert_eq!(
            ack,
            Envelope::Ack {
                id: "m1".into(),
                from: "b".into(),
                to: "a".into(),
                chain: vec!["b".into()],
            }
        );
    }

    #[tokio::test]
    async fn foreign_message_is_relayed_with_local_hop() {
        let b = node("b");
        let key_ab = generate_key();
        let key_bc = generate_key();
        let key_ac = generate_key();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let addr_a = spawn_sink(tx_a).await;
        add_peer(&b, "a", Some(addr_a), Some(key_ab)).await;

        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        let addr_c = spawn_sink(tx_c).await;
        add_peer(&b, "c", Some(addr_c), Some(key_bc)).await;

        let body_ct = encrypt(&key_ac, b"for carol").unwrap();
        let envelope = Envelope::Message {
            id: "m2".into(),
            from: "a".into(),
            to: "c".into(),
            body: BASE64.encode(&body_ct),
            chain: vec!["a".into()],
        };

        run_handler(&b, key_ab, &envelope).await;

        // Flooded to all of B's peers, each under its own link key.
        let to_c = Envelope::from_bytes(&decrypt(&key_bc, &rx_c.recv().await.unwrap()).unwrap())
            .unwrap();
        assert_eq!(to_c.chain(), &["a".to_string(), "b".to_string()]);
        assert_eq!(to_c.to_id(), "c");
        // End-to-end body untouched by the relay.
        let relayed_ct = to_c.body_ciphertext().unwrap().unwrap();
        assert_eq!(decrypt(&key_ac, &relayed_ct).unwrap(), b"for carol");

        let to_a = Envelope::from_bytes(&decrypt(&key_ab, &rx_a.recv().await.unwrap()).unwrap())
            .unwrap();
        assert_eq!(to_a.id(), "m2");

        // Nothing stored locally on the relay hop.
        assert!(b.store.lock().await.fetch_messages_since(0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn looped_envelope_is_dropped() {
        let b = node("b");
        let key_ab = generate_key();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let addr_a = spawn_sink(tx_a).await;
        add_peer(&b, "a", Some(addr_a), Some(key_ab)).await;

        let envelope = Envelope::Message {
            id: "m3".into(),
            from: "a".into(),
            to: "c".into(),
            body: BASE64.encode(b"ct"),
            chain: vec!["a".into(), "b".into()],
        };

        run_handler(&b, key_ab, &envelope).await;

        // Neither stored nor re-relayed.
        assert!(b.store.lock().await.fetch_messages_since(0).unwrap().is_empty());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_sender_is_auto_registered() {
        let b = node("b");
        let key_ab = generate_key();
        add_peer(&b, "a", Some("127.0.0.1".into()), Some(key_ab)).await;

        // Originator "z" is unknown; its key never was exchanged, so the
        // body stays ciphertext.
        let foreign_ct = encrypt(&generate_key(), b"secret").unwrap();
        let envelope = Envelope::Message {
            id: "m4".into(),
            from: "z".into(),
            to: "b".into(),
            body: BASE64.encode(&foreign_ct),
            chain: vec!["z".into(), "a".into()],
        };

        run_handler(&b, key_ab, &envelope).await;

        let registered = b.store.lock().await.get_peer_by_id("z").unwrap();
        assert_eq!(registered.name, "z");
        assert!(registered.key.is_none());
        assert!(registered.address.is_none());

        let stored = b.store.lock().await.fetch_messages_since(0).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].decrypted);
        assert_eq!(stored[0].body, BASE64.encode(&foreign_ct));
        assert_eq!(stored[0].sender, "z");
    }

    #[tokio::test]
    async fn duplicate_message_is_stored_once() {
        let b = node("b");
        let key_ab = generate_key();
        add_peer(&b, "a", Some("127.0.0.1".into()), Some(key_ab)).await;

        let body_ct = encrypt(&key_ab, b"hello").unwrap();
        let envelope = Envelope::Message {
            id: "m5".into(),
            from: "a".into(),
            to: "b".into(),
            body: BASE64.encode(&body_ct),
            chain: vec!["a".into()],
        };

        run_handler(&b, key_ab, &envelope).await;
        run_handler(&b, key_ab, &envelope).await;

        let stored = b.store.lock().await.fetch_messages_since(0).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn ack_has_no_side_effect() {
        let b = node("b");
        let key_ab = generate_key();
        add_peer(&b, "a", Some("127.0.0.1".into()), Some(key_ab)).await;

        let ack = Envelope::ack_for("m6", "a", "b");
        run_handler(&b, key_ab, &ack).await;

        assert!(b.store.lock().await.fetch_messages_since(0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_address_is_rejected() {
        let b = node("b");
        // Registry is empty: the connection is dropped before decoding and
        // nothing gets stored.
        let envelope = Envelope::new_message("a", "b", b"ct");
        run_handler(&b, generate_key(), &envelope).await;

        assert!(b.store.lock().await.fetch_messages_since(0).unwrap().is_empty());
        assert!(b.store.lock().await.list_peers().unwrap().is_empty());
    }
}
