// ============================================
// File: crates/slashauth-core/src/protocol/messages.rs
// ============================================
//! # Handshake Message Definitions
//!
//! ## Main Functionality
//! - `MessageType`: First byte of every binary handshake message
//! - `ClientHello`: Initiator's identity, ephemeral key and timestamp
//! - `ServerHello`: Responder's identity, ephemeral key and session id
//!
//! ## Message Sizes
//! | Message | Size (bytes) |
//! |---------|--------------|
//! | ClientHello | 138 |
//! | ServerHello | 146 |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Field order is critical - DO NOT reorder without version bump
//! - All multi-byte integers are little-endian
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use serde::{Deserialize, Serialize};

use crate::crypto::{ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use slashauth_common::types::SESSION_ID_SIZE;

// ============================================
// Message Size Constants
// ============================================

/// Size of ClientHello message in bytes.
pub const CLIENT_HELLO_SIZE: usize =
    2 + ED25519_PUBLIC_KEY_SIZE + X25519_PUBLIC_KEY_SIZE + 8 + ED25519_SIGNATURE_SIZE;

/// Size of ServerHello message in bytes.
pub const SERVER_HELLO_SIZE: usize =
    2 + ED25519_PUBLIC_KEY_SIZE + X25519_PUBLIC_KEY_SIZE + SESSION_ID_SIZE + ED25519_SIGNATURE_SIZE;

// ============================================
// MessageType
// ============================================

/// Handshake message type identifier.
///
/// | Value | Type |
/// |-------|------|
/// | 0x01 | ClientHello |
/// | 0x02 | ServerHello |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Initiator's handshake message.
    ClientHello = 0x01,
    /// Responder's handshake reply.
    ServerHello = 0x02,
}

impl MessageType {
    /// Converts a byte to a MessageType.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ClientHello),
            0x02 => Some(Self::ServerHello),
            _ => None,
        }
    }

    /// Converts the MessageType to its byte representation.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_byte(value).ok_or(value)
    }
}

// ============================================
// ClientHello
// ============================================

/// Initiator's handshake message.
///
/// # Wire Format (138 bytes)
/// ```text
/// ┌────────────────────────────────────────────┐
/// │ message_type (1 byte)          │ 0x01      │
/// ├────────────────────────────────────────────┤
/// │ version (1 byte)               │ Protocol  │
/// ├────────────────────────────────────────────┤
/// │ client_public_key (32 bytes)   │ Ed25519   │
/// ├────────────────────────────────────────────┤
/// │ client_ephemeral_key (32 bytes)│ X25519    │
/// ├────────────────────────────────────────────┤
/// │ timestamp (8 bytes)            │ Unix secs │
/// ├────────────────────────────────────────────┤
/// │ signature (64 bytes)           │ Ed25519   │
/// └────────────────────────────────────────────┘
/// ```
///
/// The signature covers every field before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Message type (always 0x01).
    pub message_type: u8,
    /// Protocol version.
    pub version: u8,
    /// Initiator's Ed25519 public key (identity).
    pub client_public_key: [u8; ED25519_PUBLIC_KEY_SIZE],
    /// Initiator's X25519 ephemeral public key.
    pub client_ephemeral_key: [u8; X25519_PUBLIC_KEY_SIZE],
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Ed25519 signature over the above fields.
    pub signature: [u8; ED25519_SIGNATURE_SIZE],
}

impl ClientHello {
    /// Creates an unsigned ClientHello (zero signature).
    #[must_use]
    pub fn new(
        version: u8,
        client_public_key: [u8; ED25519_PUBLIC_KEY_SIZE],
        client_ephemeral_key: [u8; X25519_PUBLIC_KEY_SIZE],
        timestamp: i64,
    ) -> Self {
        Self {
            message_type: MessageType::ClientHello.as_byte(),
            version,
            client_public_key,
            client_ephemeral_key,
            timestamp,
            signature: [0u8; ED25519_SIGNATURE_SIZE],
        }
    }

    /// Bytes covered by the initiator's signature.
    #[must_use]
    pub fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(CLIENT_HELLO_SIZE - ED25519_SIGNATURE_SIZE);
        data.push(self.message_type);
        data.push(self.version);
        data.extend_from_slice(&self.client_public_key);
        data.extend_from_slice(&self.client_ephemeral_key);
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data
    }
}

// ============================================
// ServerHello
// ============================================

/// Responder's handshake reply.
///
/// # Wire Format (146 bytes)
/// ```text
/// ┌────────────────────────────────────────────┐
/// │ message_type (1 byte)          │ 0x02      │
/// ├────────────────────────────────────────────┤
/// │ version (1 byte)               │ Protocol  │
/// ├────────────────────────────────────────────┤
/// │ server_public_key (32 bytes)   │ Ed25519   │
/// ├────────────────────────────────────────────┤
/// │ server_ephemeral_key (32 bytes)│ X25519    │
/// ├────────────────────────────────────────────┤
/// │ session_id (16 bytes)          │ AEAD AAD  │
/// ├────────────────────────────────────────────┤
/// │ signature (64 bytes)           │ Ed25519   │
/// └────────────────────────────────────────────┘
/// ```
///
/// The signature covers every field before it, then the initiator's
/// static and ephemeral keys, binding the reply to one ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Message type (always 0x02).
    pub message_type: u8,
    /// Protocol version.
    pub version: u8,
    /// Responder's Ed25519 public key.
    pub server_public_key: [u8; ED25519_PUBLIC_KEY_SIZE],
    /// Responder's X25519 ephemeral public key.
    pub server_ephemeral_key: [u8; X25519_PUBLIC_KEY_SIZE],
    /// Session identifier chosen by the responder.
    pub session_id: [u8; SESSION_ID_SIZE],
    /// Ed25519 signature.
    pub signature: [u8; ED25519_SIGNATURE_SIZE],
}

impl ServerHello {
    /// Creates an unsigned ServerHello (zero signature).
    #[must_use]
    pub fn new(
        version: u8,
        server_public_key: [u8; ED25519_PUBLIC_KEY_SIZE],
        server_ephemeral_key: [u8; X25519_PUBLIC_KEY_SIZE],
        session_id: [u8; SESSION_ID_SIZE],
    ) -> Self {
        Self {
            message_type: MessageType::ServerHello.as_byte(),
            version,
            server_public_key,
            server_ephemeral_key,
            session_id,
            signature: [0u8; ED25519_SIGNATURE_SIZE],
        }
    }

    /// Bytes covered by the responder's signature.
    #[must_use]
    pub fn signing_data(&self, client_hello: &ClientHello) -> Vec<u8> {
        let mut data = Vec::with_capacity(SERVER_HELLO_SIZE + ED25519_PUBLIC_KEY_SIZE);
        data.push(self.message_type);
        data.push(self.version);
        data.extend_from_slice(&self.server_public_key);
        data.extend_from_slice(&self.server_ephemeral_key);
        data.extend_from_slice(&self.session_id);
        data.extend_from_slice(&client_hello.client_public_key);
        data.extend_from_slice(&client_hello.client_ephemeral_key);
        data
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_roundtrip() {
        for t in [MessageType::ClientHello, MessageType::ServerHello] {
            assert_eq!(MessageType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(MessageType::try_from(0x03), Err(0x03));
    }

    #[test]
    fn test_wire_sizes() {
        assert_eq!(CLIENT_HELLO_SIZE, 138);
        assert_eq!(SERVER_HELLO_SIZE, 146);
    }

    #[test]
    fn test_server_signing_data_binds_client() {
        let hello_a = ClientHello::new(1, [1; 32], [2; 32], 0);
        let hello_b = ClientHello::new(1, [1; 32], [3; 32], 0);
        let server = ServerHello::new(1, [4; 32], [5; 32], [6; 16]);
        assert_ne!(server.signing_data(&hello_a), server.signing_data(&hello_b));
    }
}
