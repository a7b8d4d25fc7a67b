// ============================================
// File: crates/slashauth-transport/src/memory.rs
// ============================================
//! # In-Memory Transport
//!
//! A connected pair of endpoints backed by Tokio channels. Used by tests
//! and by embedders that run client and server in one process.
//!
//! ## Last Modified
//! v0.1.0 - Initial in-memory transport

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Frames buffered per direction before `send` waits.
pub const MEMORY_CHANNEL_CAPACITY: usize = 100;

/// One end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl MemoryTransport {
    /// Creates a pair of connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(MEMORY_CHANNEL_CAPACITY);
        let (tx2, rx2) = mpsc::channel(MEMORY_CHANNEL_CAPACITY);

        (
            Self {
                tx: Some(tx1),
                rx: rx2,
            },
            Self {
                tx: Some(tx2),
                rx: rx1,
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(data.to_vec())
            .await
            .map_err(|_| TransportError::Disconnected)?;
        trace!(len = data.len(), "Memory frame sent");
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        if self.tx.is_none() {
            return Err(TransportError::Disconnected);
        }
        self.rx.recv().await.ok_or(TransportError::Disconnected)
    }

    fn is_connected(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the sender ends the peer's receive loop
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.send(b"one").await.unwrap();
        a.send(b"two").await.unwrap();
        b.send(b"back").await.unwrap();

        assert_eq!(b.receive().await.unwrap(), b"one");
        assert_eq!(b.receive().await.unwrap(), b"two");
        assert_eq!(a.receive().await.unwrap(), b"back");
    }

    #[tokio::test]
    async fn test_close_disconnects_peer() {
        let (mut a, mut b) = MemoryTransport::pair();
        assert!(a.is_connected());

        a.close().await.unwrap();
        assert!(!a.is_connected());
        assert!(matches!(a.send(b"x").await, Err(TransportError::Disconnected)));
        assert!(matches!(b.receive().await, Err(TransportError::Disconnected)));
        assert!(matches!(b.send(b"x").await, Err(TransportError::Disconnected)));
    }

    #[tokio::test]
    async fn test_drop_disconnects_peer() {
        let (a, mut b) = MemoryTransport::pair();
        drop(a);
        assert!(b.receive().await.is_err());
        assert!(!b.is_connected());
    }
}
