// ============================================
// File: crates/slashauth-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Error types for the signing, secure-channel and envelope layers.
//!
//! ## Error Categories
//! 1. **Crypto Errors**: signature, handshake, channel encryption failures
//! 2. **Protocol Errors**: malformed handshake bytes, bad envelopes, unknown methods
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - `InvalidSignature` renders as exactly "Invalid signature": the server
//!   sends that text back to callers verbatim
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use slashauth_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Key material could not be parsed or generated.
    #[error("Invalid key: {context}")]
    InvalidKey {
        /// Which key was being handled
        context: String,
    },

    /// Signature did not verify, or was not a well-formed signature.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Handshake could not be completed.
    #[error("Handshake failed: {reason}")]
    HandshakeFailed {
        /// Why the handshake was rejected
        reason: String,
    },

    /// Key derivation failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What went wrong
        context: String,
    },

    /// Ciphertext failed authentication, arrived out of order, or was replayed.
    #[error("Decryption failed")]
    DecryptionFailed,

    // ========================================
    // Protocol Errors
    // ========================================

    /// Unknown or unsupported handshake message type.
    #[error("Unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    /// Protocol version mismatch.
    #[error("Unsupported protocol version: {got}, expected {expected}")]
    UnsupportedVersion {
        /// Version received
        got: u8,
        /// Version expected
        expected: u8,
    },

    /// Message is malformed.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// Message is too short to be valid.
    #[error("Message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Handshake timestamp outside the accepted window.
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        /// Why timestamp is invalid
        reason: String,
    },

    /// Method name outside the closed method set.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Challenge URL could not be parsed.
    #[error("Invalid URL: {reason}")]
    InvalidUrl {
        /// What's wrong with the URL
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(context: impl Into<String>) -> Self {
        Self::InvalidKey {
            context: context.into(),
        }
    }

    /// Creates a `HandshakeFailed` error.
    pub fn handshake(reason: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates an `InvalidTimestamp` error.
    pub fn invalid_timestamp(reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidUrl` error.
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey { .. }
                | Self::InvalidSignature
                | Self::HandshakeFailed { .. }
                | Self::KeyDerivation { .. }
                | Self::Encryption { .. }
                | Self::DecryptionFailed
        )
    }

    /// Returns `true` if the error ends the whole session rather than
    /// a single request.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::HandshakeFailed { .. }
                | Self::DecryptionFailed
                | Self::Encryption { .. }
                | Self::KeyDerivation { .. }
                | Self::UnknownMessageType(_)
                | Self::UnsupportedVersion { .. }
                | Self::MessageTooShort { .. }
                | Self::InvalidTimestamp { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature
                | Self::DecryptionFailed
                | Self::HandshakeFailed { .. }
                | Self::InvalidTimestamp { .. }
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_visible_messages() {
        assert_eq!(CoreError::InvalidSignature.to_string(), "Invalid signature");
        assert_eq!(
            CoreError::UnknownMethod("logout".into()).to_string(),
            "Unknown method: logout"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::InvalidSignature.is_crypto_error());
        assert!(CoreError::InvalidSignature.is_suspicious());
        assert!(!CoreError::InvalidSignature.is_session_fatal());

        assert!(CoreError::DecryptionFailed.is_session_fatal());
        assert!(CoreError::handshake("bad key").is_session_fatal());
        assert!(!CoreError::malformed("x").is_session_fatal());
        assert!(!CoreError::UnknownMethod("x".into()).is_crypto_error());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_input("field", "bad value");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
