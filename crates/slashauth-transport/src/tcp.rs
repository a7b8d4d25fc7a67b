// ============================================
// File: crates/slashauth-transport/src/tcp.rs
// ============================================
//! # TCP Transport Implementation
//!
//! ## Creation Reason
//! Carries SlashAuth frames between processes over a TCP stream.
//!
//! ## Main Functionality
//! - `TcpTransport`: length-prefixed frames over one TCP connection
//! - `TcpTransportListener`: accept loop building `TcpTransport`s
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────┬──────────────────────────────┐
//! │ length (u32, BE) │ payload (length bytes)       │
//! └──────────────────┴──────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frames above `MAX_FRAME_SIZE` are rejected before allocation
//! - EOF at a frame boundary is `Disconnected`; EOF inside a frame is I/O
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP transport implementation

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportListener};

/// Maximum payload size of one frame (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Size of the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

// ============================================
// TcpTransport
// ============================================

/// Length-prefixed framing over a TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    connected: bool,
}

impl TcpTransport {
    /// Connects to a listening peer.
    ///
    /// # Errors
    /// `InvalidAddress` or `ConnectFailed`.
    pub async fn connect(addr: impl AsRef<str>) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr = addr_str.parse().map_err(|_| TransportError::InvalidAddress {
            addr: addr_str.to_string(),
        })?;

        let stream = TcpStream::connect(socket_addr)
            .await
            .map_err(|e| TransportError::connect_failed(socket_addr, e.to_string()))?;
        debug!("Connected to {}", socket_addr);
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already-connected stream.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        // Frames are small and latency-bound
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        let peer_addr = stream.peer_addr().ok();
        Self {
            stream,
            peer_addr,
            connected: true,
        }
    }

    /// Address of the remote end, when known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        if data.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + data.len());
        // Bounded by MAX_FRAME_SIZE above
        #[allow(clippy::cast_possible_truncation)]
        frame.put_u32(data.len() as u32);
        frame.put_slice(data);

        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| TransportError::io("writing frame", e))?;
        trace!(len = data.len(), "TCP frame sent");
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        match self.stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.connected = false;
                return Err(TransportError::Disconnected);
            }
            Err(e) => return Err(TransportError::io("reading frame header", e)),
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            self.connected = false;
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| TransportError::io("reading frame payload", e))?;
        trace!(len, "TCP frame received");
        Ok(payload)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            self.stream
                .shutdown()
                .await
                .map_err(|e| TransportError::io("shutting down stream", e))?;
        }
        Ok(())
    }
}

// ============================================
// TcpTransportListener
// ============================================

/// Accepts TCP connections as [`TcpTransport`]s.
#[derive(Debug)]
pub struct TcpTransportListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransportListener {
    /// Binds to the given address (e.g. "0.0.0.0:8787").
    ///
    /// # Errors
    /// `InvalidAddress` or `BindFailed`.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr = addr_str.parse().map_err(|_| TransportError::InvalidAddress {
            addr: addr_str.to_string(),
        })?;

        let listener = TcpListener::bind(socket_addr)
            .await
            .map_err(|e| TransportError::bind_failed(socket_addr, e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        info!("TCP transport listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Waits for the next connection.
    ///
    /// # Errors
    /// I/O errors from accept.
    pub async fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        let (stream, addr) = self.accept_stream().await?;
        Ok((TcpTransport::from_stream(stream), addr))
    }

    /// Accepts a raw stream, for carriers that speak a preamble first.
    pub(crate) async fn accept_stream(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::io("accepting connection", e))?;
        debug!("Accepted connection from {}", addr);
        Ok((stream, addr))
    }

    /// The bound address (resolves port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl TransportListener for TcpTransportListener {
    type Transport = TcpTransport;

    async fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        TcpTransportListener::accept(self).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_pair() -> (TcpTransport, TcpTransport) {
        let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().to_string();
        let (client, accepted) = tokio::join!(TcpTransport::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_frames_roundtrip() {
        let (mut client, mut server) = connected_pair().await;

        client.send(b"hello").await.unwrap();
        client.send(b"").await.unwrap();
        assert_eq!(server.receive().await.unwrap(), b"hello");
        assert!(server.receive().await.unwrap().is_empty());

        server.send(&[7u8; 4096]).await.unwrap();
        assert_eq!(client.receive().await.unwrap(), vec![7u8; 4096]);
    }

    #[tokio::test]
    async fn test_close_is_disconnect() {
        let (mut client, mut server) = connected_pair().await;
        client.close().await.unwrap();
        assert!(!client.is_connected());
        assert!(matches!(server.receive().await, Err(TransportError::Disconnected)));
        assert!(!server.is_connected());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = connected_pair().await;
        let big = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            client.send(&big).await,
            Err(TransportError::FrameTooLarge { .. })
        ));

        // A peer announcing an oversized frame is rejected before allocation
        client.stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        assert!(matches!(
            server.receive().await,
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_addresses() {
        assert!(matches!(
            TcpTransport::connect("not an address").await,
            Err(TransportError::InvalidAddress { .. })
        ));
        assert!(TcpTransportListener::bind("localhost").await.is_err());
    }
}
