//! In-process transport: a connector paired with a listener.
//!
//! [`memory_pair`] returns a [`MemoryConnector`] for the client side and a
//! [`MemoryListener`] that plays the server. Each `connect` creates a
//! fresh duplex channel and hands the server end to the listener.
//!
//! ```rust
//! # tokio_test_block(async {
//! use murmur_transport::{memory, Connection, Connector};
//!
//! let (connector, listener) = memory::memory_pair();
//! let client = connector.connect("memory").await.unwrap();
//! let server = listener.accept().await.unwrap();
//!
//! server.send(b"hello").await.unwrap();
//! assert_eq!(client.recv().await.unwrap(), Some(b"hello".to_vec()));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f);
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Connector, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Creates a connected connector/listener pair.
pub fn memory_pair() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector { accept_tx },
        MemoryListener {
            accept_rx: Mutex::new(accept_rx),
        },
    )
}

/// Client side of the in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryConnection>,
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        addr: &str,
    ) -> Result<Self::Connection, TransportError> {
        let (client, server) = MemoryConnection::pair();
        self.accept_tx.send(server).map_err(|_| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory listener dropped",
            ))
        })?;
        tracing::debug!(id = %client.id, addr, "memory connection established");
        Ok(client)
    }
}

/// Server side of the in-memory transport.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: Mutex<mpsc::UnboundedReceiver<MemoryConnection>>,
}

impl MemoryListener {
    /// Waits for the next client connection.
    ///
    /// Returns `None` once every [`MemoryConnector`] has been dropped.
    pub async fn accept(&self) -> Option<MemoryConnection> {
        self.accept_rx.lock().await.recv().await
    }
}

/// One end of an in-memory duplex channel.
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    /// `None` once this end has been closed.
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates two connected ends: what one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a = Self {
            id: next_id(),
            tx: Mutex::new(Some(b_tx)),
            rx: Mutex::new(a_rx),
        };
        let b = Self {
            id: next_id(),
            tx: Mutex::new(Some(a_tx)),
            rx: Mutex::new(b_rx),
        };
        (a, b)
    }
}

fn next_id() -> ConnectionId {
    ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed))
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("closed locally".into())
        })?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping our sender ends the peer's receive stream.
        self.tx.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_both_directions() {
        let (a, b) = MemoryConnection::pair();
        a.send(b"ping").await.unwrap();
        b.send(b"pong").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Some(b"ping".to_vec()));
        assert_eq!(a.recv().await.unwrap(), Some(b"pong".to_vec()));
    }

    #[tokio::test]
    async fn test_pair_preserves_order() {
        let (a, b) = MemoryConnection::pair();
        for i in 0..10u8 {
            a.send(&[i]).await.unwrap();
        }
        for i in 0..10u8 {
            assert_eq!(b.recv().await.unwrap(), Some(vec![i]));
        }
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = MemoryConnection::pair();
        a.close().await.unwrap();
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = MemoryConnection::pair();
        a.close().await.unwrap();
        let result = a.send(b"late").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (a, b) = MemoryConnection::pair();
        drop(b);
        let result = a.send(b"nobody home").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_connector_hands_server_end_to_listener() {
        let (connector, listener) = memory_pair();
        let client = connector.connect("memory").await.unwrap();
        let server = listener.accept().await.expect("should accept");

        client.send(b"hi").await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Some(b"hi".to_vec()));
        assert_ne!(client.id(), server.id());
    }

    #[tokio::test]
    async fn test_connect_without_listener_fails() {
        let (connector, listener) = memory_pair();
        drop(listener);
        let result = connector.connect("memory").await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
