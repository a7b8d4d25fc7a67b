// ============================================
// File: crates/slashauth-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Error Categories
//! - **Construction**: missing key pair or server key
//! - **Remote**: the server answered `{error:{message}}`
//! - **Protocol**: unverifiable or malformed replies
//! - **Session**: client unusable after a channel-level failure
//! - **Wrapped**: core and transport errors
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Remote` carries the server's message verbatim
//! - After any `is_session_fatal` error the client is `Failed` and must be
//!   rebuilt on a fresh connection
//!
//! ## Last Modified
//! v0.1.0 - Initial client error types

use thiserror::Error;

use slashauth_core::error::CoreError;
use slashauth_transport::TransportError;

use crate::client::ClientState;

// ============================================
// ClientError
// ============================================

/// Errors surfaced by [`AuthClient`](crate::AuthClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The builder was missing a required input.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// What is missing or wrong.
        reason: String,
    },

    /// The server rejected the request.
    #[error("Server rejected request: {message}")]
    Remote {
        /// Message from the server's error envelope.
        message: String,
    },

    /// The server's reply was well-formed but not what the method expects.
    #[error("Unexpected response: {reason}")]
    UnexpectedResponse {
        /// What was wrong with it.
        reason: String,
    },

    /// The operation is not allowed in the current state.
    #[error("Operation not allowed in state {state:?}")]
    InvalidState {
        /// State the client was in.
        state: ClientState,
    },

    /// Cryptographic or protocol error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates a remote error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates an unexpected-response error.
    pub fn unexpected_response(reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            reason: reason.into(),
        }
    }

    /// Returns the server's message for `Remote` errors.
    #[must_use]
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Remote { message } => Some(message),
            _ => None,
        }
    }

    /// Returns `true` if the connection can no longer be used.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::InvalidState { .. } | Self::Transport(_) => true,
            Self::Core(e) => e.is_session_fatal(),
            _ => false,
        }
    }

    /// Returns `true` if a fresh attempt on a new connection may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

// ============================================
// Tests
// ============================================
