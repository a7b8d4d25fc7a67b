// ============================================
// File: crates/slashauth-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for moving frames between two endpoints, whether
//! over an in-memory channel or a TCP stream.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Error conversion from system errors
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Connection Errors**: bind/connect failures, peer gone
//! 2. **Framing Errors**: oversized frames, bad HTTP tunnel heads
//! 3. **System Errors**: I/O failures, timeouts
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Disconnected` is the normal end of a connection, not a fault
//! - A framing error leaves the stream unusable; close it
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use slashauth_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Connection Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: String,
        /// Why binding failed
        reason: String,
    },

    /// Failed to connect to a peer.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Address we tried to reach
        addr: String,
        /// Why connecting failed
        reason: String,
    },

    /// The peer closed the connection, or this endpoint was closed.
    #[error("Connection closed")]
    Disconnected,

    /// Invalid socket address.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    // ========================================
    // Framing Errors
    // ========================================

    /// A frame exceeded the maximum allowed size.
    #[error("Frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Announced or attempted size
        size: usize,
        /// Maximum frame size
        max: usize,
    },

    /// The HTTP tunnel exchange was malformed.
    #[error("HTTP tunnel error: {reason}")]
    Tunnel {
        /// What was wrong with the exchange
        reason: String,
    },

    /// The HTTP tunnel was refused with a non-200 status.
    #[error("HTTP tunnel rejected with status {status}")]
    TunnelRejected {
        /// HTTP status code
        status: u16,
    },

    // ========================================
    // System Errors
    // ========================================

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: impl ToString, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr: addr.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(addr: impl ToString, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr: addr.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Tunnel` error.
    pub fn tunnel(reason: impl Into<String>) -> Self {
        Self::Tunnel {
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the connection is gone.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
