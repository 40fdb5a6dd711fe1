//! One transport connection bound to one peer's key.
//!
//! Send: serialize, encrypt, write, shut down the write side so the
//! receiver's read-to-end terminates.  Receive: read to end-of-stream,
//! decrypt, decode.  A configurable timeout bounds worst-case blocking on
//! connect and on the read.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use courier_shared::crypto::{self, SymmetricKey};
use courier_shared::Envelope;

use crate::error::NetError;

pub struct Channel {
    stream: TcpStream,
    key: SymmetricKey,
    timeout: Duration,
}

impl Channel {
    /// Open a fresh connection to `addr`, bound to `key`.
    pub async fn connect(addr: &str, key: SymmetricKey, timeout: Duration) -> Result<Self, NetError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| NetError::ConnectTimeout(timeout))??;
        Ok(Self::from_stream(stream, key, timeout))
    }

    /// Wrap an already-accepted connection, e.g. on the server side after
    /// the sending peer has been resolved by its source address.
    pub fn from_stream(stream: TcpStream, key: SymmetricKey, timeout: Duration) -> Self {
        Self {
            stream,
            key,
            timeout,
        }
    }

    /// Serialize and encrypt `envelope`, write the full ciphertext, then
    /// terminate the write side.  Message boundaries are connection
    /// boundaries, so closing the write half signals completion.
    pub async fn send(mut self, envelope: &Envelope) -> Result<(), NetError> {
        let plaintext = envelope.to_bytes()?;
        let ciphertext = crypto::encrypt(&self.key, &plaintext)?;

        self.stream.write_all(&ciphertext).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Read until the peer closes its write side, then decrypt and decode.
    pub async fn receive_all(mut self) -> Result<Envelope, NetError> {
        let mut ciphertext = Vec::new();
        tokio::time::timeout(self.timeout, self.stream.read_to_end(&mut ciphertext))
            .await
            .map_err(|_| NetError::ReadTimeout(self.timeout))??;

        let plaintext = crypto::decrypt(&self.key, &ciphertext)?;
        Ok(Envelope::from_bytes(&plaintext)?)
    }
}
