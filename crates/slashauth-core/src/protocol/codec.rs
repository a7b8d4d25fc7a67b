// ============================================
// File: crates/slashauth-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Main Functionality
//! - `Codec` trait: Generic encode/decode interface
//! - `ProtocolCodec`: binary handshake messages and JSON envelopes
//!
//! ## Wire Format
//! - Handshake messages: fixed-size binary, little-endian integers
//! - Envelopes: compact JSON (serde_json)
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - A decode failure here is a connection-level error for the caller
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::protocol::envelope::{EncryptedEnvelope, RequestEnvelope, ResponseEnvelope};
use crate::protocol::messages::{
    ClientHello, MessageType, ServerHello, CLIENT_HELLO_SIZE, SERVER_HELLO_SIZE,
};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
pub trait Codec<T> {
    /// Encodes a message into a byte buffer.
    ///
    /// # Errors
    /// Serialization failure (JSON messages only).
    fn encode(&self, msg: &T, buf: &mut BytesMut) -> Result<()>;

    /// Decodes a message from bytes.
    ///
    /// # Errors
    /// Truncated, mistyped or unparseable input.
    fn decode(&self, buf: &mut Bytes) -> Result<T>;
}

// ============================================
// ProtocolCodec
// ============================================

/// Codec implementation for all protocol messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    /// Creates a new protocol codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Identifies the handshake message type without consuming the buffer.
    ///
    /// # Errors
    /// Empty buffer or unknown type byte.
    pub fn peek_message_type(buf: &[u8]) -> Result<MessageType> {
        let first = *buf.first().ok_or(CoreError::too_short(1, 0))?;
        MessageType::from_byte(first).ok_or(CoreError::UnknownMessageType(first))
    }

    fn expect_type(buf: &mut Bytes, expected: MessageType) -> Result<u8> {
        let message_type = buf.get_u8();
        if message_type == expected.as_byte() {
            Ok(message_type)
        } else {
            Err(CoreError::malformed(format!(
                "Expected {expected:?} (0x{:02x}), got 0x{message_type:02x}",
                expected.as_byte()
            )))
        }
    }

    fn encode_json<T: Serialize>(msg: &T, buf: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(msg).map_err(|e| CoreError::malformed(e.to_string()))?;
        buf.put_slice(&json);
        Ok(())
    }

    fn decode_json<T: DeserializeOwned>(buf: &mut Bytes, what: &str) -> Result<T> {
        let value = serde_json::from_slice(&buf[..])
            .map_err(|e| CoreError::malformed(format!("invalid {what}: {e}")))?;
        buf.advance(buf.remaining());
        Ok(value)
    }
}

// ============================================
// ClientHello Codec
// ============================================

impl Codec<ClientHello> for ProtocolCodec {
    fn encode(&self, msg: &ClientHello, buf: &mut BytesMut) -> Result<()> {
        buf.reserve(CLIENT_HELLO_SIZE);
        buf.put_u8(msg.message_type);
        buf.put_u8(msg.version);
        buf.put_slice(&msg.client_public_key);
        buf.put_slice(&msg.client_ephemeral_key);
        buf.put_i64_le(msg.timestamp);
        buf.put_slice(&msg.signature);
        Ok(())
    }

    fn decode(&self, buf: &mut Bytes) -> Result<ClientHello> {
        if buf.len() < CLIENT_HELLO_SIZE {
            return Err(CoreError::too_short(CLIENT_HELLO_SIZE, buf.len()));
        }

        let message_type = Self::expect_type(buf, MessageType::ClientHello)?;
        let version = buf.get_u8();

        let mut client_public_key = [0u8; 32];
        buf.copy_to_slice(&mut client_public_key);

        let mut client_ephemeral_key = [0u8; 32];
        buf.copy_to_slice(&mut client_ephemeral_key);

        let timestamp = buf.get_i64_le();

        let mut signature = [0u8; 64];
        buf.copy_to_slice(&mut signature);

        Ok(ClientHello {
            message_type,
            version,
            client_public_key,
            client_ephemeral_key,
            timestamp,
            signature,
        })
    }
}

// ============================================
// ServerHello Codec
// ============================================

impl Codec<ServerHello> for ProtocolCodec {
    fn encode(&self, msg: &ServerHello, buf: &mut BytesMut) -> Result<()> {
        buf.reserve(SERVER_HELLO_SIZE);
        buf.put_u8(msg.message_type);
        buf.put_u8(msg.version);
        buf.put_slice(&msg.server_public_key);
        buf.put_slice(&msg.server_ephemeral_key);
        buf.put_slice(&msg.session_id);
        buf.put_slice(&msg.signature);
        Ok(())
    }

    fn decode(&self, buf: &mut Bytes) -> Result<ServerHello> {
        if buf.len() < SERVER_HELLO_SIZE {
            return Err(CoreError::too_short(SERVER_HELLO_SIZE, buf.len()));
        }

        let message_type = Self::expect_type(buf, MessageType::ServerHello)?;
        let version = buf.get_u8();

        let mut server_public_key = [0u8; 32];
        buf.copy_to_slice(&mut server_public_key);

        let mut server_ephemeral_key = [0u8; 32];
        buf.copy_to_slice(&mut server_ephemeral_key);

        let mut session_id = [0u8; 16];
        buf.copy_to_slice(&mut session_id);

        let mut signature = [0u8; 64];
        buf.copy_to_slice(&mut signature);

        Ok(ServerHello {
            message_type,
            version,
            server_public_key,
            server_ephemeral_key,
            session_id,
            signature,
        })
    }
}

// ============================================
// Envelope Codecs
// ============================================

impl Codec<RequestEnvelope> for ProtocolCodec {
    fn encode(&self, msg: &RequestEnvelope, buf: &mut BytesMut) -> Result<()> {
        Self::encode_json(msg, buf)
    }

    fn decode(&self, buf: &mut Bytes) -> Result<RequestEnvelope> {
        Self::decode_json(buf, "request envelope")
    }
}

impl Codec<ResponseEnvelope> for ProtocolCodec {
    fn encode(&self, msg: &ResponseEnvelope, buf: &mut BytesMut) -> Result<()> {
        Self::encode_json(msg, buf)
    }

    fn decode(&self, buf: &mut Bytes) -> Result<ResponseEnvelope> {
        Self::decode_json(buf, "response envelope")
    }
}

impl Codec<EncryptedEnvelope> for ProtocolCodec {
    fn encode(&self, msg: &EncryptedEnvelope, buf: &mut BytesMut) -> Result<()> {
        Self::encode_json(msg, buf)
    }

    fn decode(&self, buf: &mut Bytes) -> Result<EncryptedEnvelope> {
        Self::decode_json(buf, "encrypted envelope")
    }
}

// ============================================
// Convenience Functions
// ============================================

/// Encodes any message the codec supports into a fresh buffer.
///
/// # Errors
/// See [`Codec::encode`].
pub fn encode<T>(msg: &T) -> Result<BytesMut>
where
    ProtocolCodec: Codec<T>,
{
    let mut buf = BytesMut::new();
    ProtocolCodec.encode(msg, &mut buf)?;
    Ok(buf)
}

/// Decodes any message the codec supports from a byte slice.
///
/// # Errors
/// See [`Codec::decode`].
pub fn decode<T>(buf: &[u8]) -> Result<T>
where
    ProtocolCodec: Codec<T>,
{
    let mut bytes = Bytes::copy_from_slice(buf);
    ProtocolCodec.decode(&mut bytes)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::envelope::Method;
    use serde_json::json;

    fn sample_client_hello() -> ClientHello {
        ClientHello {
            message_type: MessageType::ClientHello.as_byte(),
            version: 1,
            client_public_key: [0x01u8; 32],
            client_ephemeral_key: [0x02u8; 32],
            timestamp: 0x0102_0304_0506_0708,
            signature: [0x03u8; 64],
        }
    }

    #[test]
    fn test_client_hello_layout() {
        let encoded = encode(&sample_client_hello()).unwrap();
        assert_eq!(encoded.len(), CLIENT_HELLO_SIZE);
        assert_eq!(encoded[0], 0x01);
        // Timestamp is at offset 1 + 1 + 32 + 32 = 66, little-endian
        assert_eq!(&encoded[66..74], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);

        let decoded: ClientHello = decode(&encoded).unwrap();
        assert_eq!(decoded, sample_client_hello());
    }

    #[test]
    fn test_server_hello_layout() {
        let original = ServerHello::new(1, [0x01; 32], [0x02; 32], [0x04; 16]);
        let encoded = encode(&original).unwrap();
        assert_eq!(encoded.len(), SERVER_HELLO_SIZE);
        // Session id follows both keys
        assert_eq!(&encoded[66..82], &[0x04; 16]);
        let decoded: ServerHello = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_peek_message_type() {
        assert_eq!(
            ProtocolCodec::peek_message_type(&[0x01u8; 4]).unwrap(),
            MessageType::ClientHello
        );
        assert!(matches!(
            ProtocolCodec::peek_message_type(&[0xFFu8; 4]),
            Err(CoreError::UnknownMessageType(0xFF))
        ));
        assert!(ProtocolCodec::peek_message_type(&[]).is_err());
    }

    #[test]
    fn test_decode_wrong_message_type() {
        let bytes = [0x02u8; CLIENT_HELLO_SIZE];
        assert!(matches!(
            decode::<ClientHello>(&bytes),
            Err(CoreError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            decode::<ClientHello>(&[0x01u8; 50]),
            Err(CoreError::MessageTooShort { .. })
        ));
        assert!(matches!(
            decode::<ServerHello>(&[0x02u8; 145]),
            Err(CoreError::MessageTooShort { .. })
        ));
    }

    #[test]
    fn test_envelope_json() {
        let req = RequestEnvelope::new(Method::RequestToken, json!({}), "ab").signed("n", "s");
        let encoded = encode(&req).unwrap();
        let decoded: RequestEnvelope = decode(&encoded).unwrap();
        assert_eq!(decoded, req);

        assert!(matches!(
            decode::<RequestEnvelope>(b"not json"),
            Err(CoreError::MalformedMessage { .. })
        ));
        assert!(decode::<ResponseEnvelope>(br#"{"result":1}"#).is_ok());
        assert!(decode::<EncryptedEnvelope>(br#"{"result":1}"#).is_err());
    }
}
