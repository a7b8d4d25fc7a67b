// ============================================
// File: crates/slashauth-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! Request-level failures (`InvalidToken`, `Storage`, `Application`, core
//! signature/method errors) are answered on the wire with
//! [`ServerError::wire_message`]; everything else ends the connection or
//! the process.
//!
//! ## Last Modified
//! v0.1.0 - Initial server errors

use thiserror::Error;

use slashauth_common::error::CommonError;
use slashauth_core::error::CoreError;
use slashauth_transport::error::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File path
        path: String,
        /// Reason
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field name
        field: String,
        /// Reason
        reason: String,
    },

    /// A builder was missing a required collaborator.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// What is missing
        reason: String,
    },

    /// Token absent, consumed, or mismatched.
    #[error("Invalid token")]
    InvalidToken,

    /// `requestToken` nonce stale, malformed, or already used.
    #[error("Invalid nonce")]
    InvalidNonce,

    /// Token backend failure.
    #[error("Storage error: {reason}")]
    Storage {
        /// Backend message
        reason: String,
    },

    /// Application callback rejected the request.
    #[error("{message}")]
    Application {
        /// Callback message, returned verbatim
        message: String,
    },

    /// Key file could not be read, parsed or written.
    #[error("Key file '{path}': {reason}")]
    KeyFile {
        /// File path
        path: String,
        /// Reason
        reason: String,
    },

    /// Server failed to start.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// Reason
        reason: String,
    },

    /// Server is shutting down.
    #[error("Server is shutting down")]
    ShuttingDown,

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from transport crate.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates a `Storage` error.
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// Creates an `Application` error.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Creates a `KeyFile` error.
    pub fn key_file(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::KeyFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Text placed in `{"error":{"message":..}}`.
    ///
    /// Internal failures are not described to the peer.
    #[must_use]
    pub fn wire_message(&self) -> String {
        match self {
            Self::Application { message } => message.clone(),
            Self::InvalidToken | Self::InvalidNonce | Self::Storage { .. } | Self::Core(_) => {
                self.to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }

    /// Returns `true` for configuration problems.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::Configuration { .. }
                | Self::KeyFile { .. }
        )
    }

    /// Returns `true` if the error ends the connection rather than the
    /// request.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Core(e) => e.is_session_fatal(),
            Self::Transport(_) | Self::Io(_) | Self::ShuttingDown => true,
            _ => false,
        }
    }

    /// Returns `true` if the peer sent something that deserves a warning
    /// in the logs.
    #[must_use]
    pub fn is_suspicious(&self) -> bool {
        match self {
            Self::InvalidToken | Self::InvalidNonce => true,
            Self::Core(e) => e.is_suspicious(),
            _ => false,
        }
    }

    /// Returns `true` if the error cannot be recovered without operator
    /// action.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::Configuration { .. }
                | Self::KeyFile { .. }
                | Self::StartupFailed { .. }
        )
    }

    /// Returns `true` if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Storage { .. } => true,
            _ => false,
        }
    }
}
