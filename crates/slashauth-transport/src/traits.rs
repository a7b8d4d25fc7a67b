// ============================================
// File: crates/slashauth-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! The protocol engines only need to move whole frames between two
//! endpoints. This trait is that seam; encryption lives above it.
//!
//! ## Main Functionality
//! - `Transport`: ordered, message-framed, bidirectional byte transport
//! - `TransportListener`: source of inbound transports for the server loop
//!
//! ## ⚠️ Important Note for Next Developer
//! - One `send` on one side is exactly one `receive` on the other
//! - Implementations must be Send + Sync for use in async contexts
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

// ============================================
// Transport Trait
// ============================================

/// Abstract interface for a framed, connected transport.
///
/// # Example
/// ```ignore
/// async fn echo<T: Transport>(transport: &mut T) -> Result<()> {
///     loop {
///         let frame = transport.receive().await?;
///         transport.send(&frame).await?;
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one frame to the peer.
    ///
    /// # Errors
    /// `Disconnected` after close, `FrameTooLarge` or I/O errors.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receives the next frame from the peer.
    ///
    /// Waits until a frame is available or the connection is closed.
    ///
    /// # Errors
    /// `Disconnected` when the peer is gone.
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Returns `true` while the transport can still be used.
    fn is_connected(&self) -> bool;

    /// Closes this endpoint. The peer observes `Disconnected`.
    ///
    /// # Errors
    /// Returns error if shutdown fails.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        (**self).receive().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

// ============================================
// TransportListener Trait
// ============================================

/// Accepts inbound connections as transports.
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// Transport produced per accepted connection.
    type Transport: Transport + 'static;

    /// Waits for the next connection.
    ///
    /// # Errors
    /// I/O errors from accept. A failed accept does not close the listener.
    async fn accept(&self) -> Result<(Self::Transport, SocketAddr)>;

    /// The bound address.
    fn local_addr(&self) -> SocketAddr;
}
