// ============================================
// File: crates/slashauth-core/src/crypto/channel.rs
// ============================================
//! # Secure Channel
//!
//! ## Creation Reason
//! After the handshake, every envelope travels as a ChaCha20-Poly1305 frame
//! under a per-direction key, so a frame can neither be reflected back to
//! its sender nor replayed within the session.
//!
//! ## Frame Format
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Counter (8 bytes LE)          │ ← Nonce source          │
//! ├────────────────────────────────────────────────────────┤
//! │ Ciphertext (variable)         │ ← ChaCha20              │
//! │ └─ Poly1305 Tag (16 bytes)    │ ← AAD = session id      │
//! └────────────────────────────────────────────────────────┘
//! nonce (12 bytes) = counter (8 bytes LE) || 0x00000000
//! ```
//!
//! ## Main Logical Flow
//! 1. `encrypt` seals with `tx_key` at `tx_counter`, then advances it
//! 2. `decrypt` requires the frame counter to equal `rx_counter` exactly
//! 3. Only a successfully authenticated frame advances `rx_counter`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never reuse a (key, nonce) pair - counters must not wrap
//! - Every failure is `DecryptionFailed`; callers end the session on it
//!
//! ## Last Modified
//! v0.1.0 - Initial channel implementation

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use tracing::{trace, warn};

use slashauth_common::types::SessionId;

use super::kdf::ChannelKeys;
use super::keys::{IdentityPublicKey, SessionKey};
use super::{CHACHA20_NONCE_SIZE, POLY1305_TAG_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Size of the counter prefix on every frame.
pub const FRAME_COUNTER_SIZE: usize = 8;

/// Bytes a frame adds on top of its plaintext.
pub const FRAME_OVERHEAD: usize = FRAME_COUNTER_SIZE + POLY1305_TAG_SIZE;

// ============================================
// ChannelRole
// ============================================

/// Which side of the handshake this channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Sent the ClientHello.
    Initiator,
    /// Answered with the ServerHello.
    Responder,
}

// ============================================
// SecureChannel
// ============================================

/// Established, mutually authenticated channel.
pub struct SecureChannel {
    role: ChannelRole,
    session_id: SessionId,
    remote_static: IdentityPublicKey,
    tx_key: SessionKey,
    rx_key: SessionKey,
    tx_counter: u64,
    rx_counter: u64,
}

impl SecureChannel {
    /// Assembles a channel from derived keys. The role decides which
    /// directional key is used for sending.
    #[must_use]
    pub fn new(
        role: ChannelRole,
        session_id: SessionId,
        remote_static: IdentityPublicKey,
        keys: ChannelKeys,
    ) -> Self {
        let ChannelKeys {
            initiator_to_responder,
            responder_to_initiator,
        } = keys;
        let (tx_key, rx_key) = match role {
            ChannelRole::Initiator => (initiator_to_responder, responder_to_initiator),
            ChannelRole::Responder => (responder_to_initiator, initiator_to_responder),
        };
        Self {
            role,
            session_id,
            remote_static,
            tx_key,
            rx_key,
            tx_counter: 0,
            rx_counter: 0,
        }
    }

    /// The peer's authenticated static key.
    #[must_use]
    pub fn remote_static_key(&self) -> &IdentityPublicKey {
        &self.remote_static
    }

    /// Session identifier (AEAD associated data).
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// This side's role.
    #[must_use]
    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Number of frames sent so far.
    #[must_use]
    pub fn tx_counter(&self) -> u64 {
        self.tx_counter
    }

    /// Number of frames received so far.
    #[must_use]
    pub fn rx_counter(&self) -> u64 {
        self.rx_counter
    }

    fn make_nonce(counter: u64) -> Nonce {
        let mut nonce = [0u8; CHACHA20_NONCE_SIZE];
        nonce[..8].copy_from_slice(&counter.to_le_bytes());
        Nonce::from(nonce)
    }

    /// Seals `plaintext` into the next outgoing frame.
    ///
    /// # Errors
    /// `Encryption` if the send counter is exhausted or the cipher fails.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.tx_counter;
        let next = counter.checked_add(1).ok_or_else(|| CoreError::Encryption {
            context: "send counter exhausted".into(),
        })?;

        let cipher = ChaCha20Poly1305::new_from_slice(self.tx_key.as_bytes()).map_err(|_| {
            CoreError::Encryption {
                context: "Failed to create cipher".into(),
            }
        })?;
        let ciphertext = cipher
            .encrypt(
                &Self::make_nonce(counter),
                Payload {
                    msg: plaintext,
                    aad: self.session_id.as_bytes(),
                },
            )
            .map_err(|_| CoreError::Encryption {
                context: "ChaCha20-Poly1305 encryption failed".into(),
            })?;

        let mut frame = Vec::with_capacity(FRAME_COUNTER_SIZE + ciphertext.len());
        frame.extend_from_slice(&counter.to_le_bytes());
        frame.extend_from_slice(&ciphertext);

        self.tx_counter = next;
        trace!(session_id = ?self.session_id, counter, "Frame sealed");
        Ok(frame)
    }

    /// Opens the next incoming frame.
    ///
    /// # Errors
    /// `DecryptionFailed` for a short frame, an out-of-order or replayed
    /// counter, or a failed authentication tag.
    pub fn decrypt(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(CoreError::DecryptionFailed);
        }
        let (counter_bytes, ciphertext) = frame.split_at(FRAME_COUNTER_SIZE);
        let mut raw = [0u8; FRAME_COUNTER_SIZE];
        raw.copy_from_slice(counter_bytes);
        let counter = u64::from_le_bytes(raw);

        if counter != self.rx_counter {
            warn!(
                session_id = ?self.session_id,
                expected = self.rx_counter,
                received = counter,
                "Out-of-order or replayed frame"
            );
            return Err(CoreError::DecryptionFailed);
        }
        let next = counter.checked_add(1).ok_or(CoreError::DecryptionFailed)?;

        let cipher = ChaCha20Poly1305::new_from_slice(self.rx_key.as_bytes())
            .map_err(|_| CoreError::DecryptionFailed)?;
        let plaintext = cipher
            .decrypt(
                &Self::make_nonce(counter),
                Payload {
                    msg: ciphertext,
                    aad: self.session_id.as_bytes(),
                },
            )
            .map_err(|_| CoreError::DecryptionFailed)?;

        self.rx_counter = next;
        trace!(session_id = ?self.session_id, counter, "Frame opened");
        Ok(plaintext)
    }

    /// [`encrypt`](Self::encrypt) followed by base64, for `{encrypted}` envelopes.
    ///
    /// # Errors
    /// As [`encrypt`](Self::encrypt).
    pub fn encrypt_to_base64(&mut self, plaintext: &[u8]) -> Result<String> {
        self.encrypt(plaintext).map(|frame| BASE64.encode(frame))
    }

    /// Base64-decodes then [`decrypt`](Self::decrypt)s.
    ///
    /// # Errors
    /// `DecryptionFailed`, including for invalid base64.
    pub fn decrypt_from_base64(&mut self, encoded: &str) -> Result<Vec<u8>> {
        let frame = BASE64
            .decode(encoded)
            .map_err(|_| CoreError::DecryptionFailed)?;
        self.decrypt(&frame)
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("role", &self.role)
            .field("session_id", &self.session_id)
            .field("remote_static", &self.remote_static)
            .field("tx_counter", &self.tx_counter)
            .field("rx_counter", &self.rx_counter)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentityKeyPair;

    fn channel_pair() -> (SecureChannel, SecureChannel) {
        let session_id = SessionId::generate();
        let initiator_id = IdentityKeyPair::generate();
        let responder_id = IdentityKeyPair::generate();
        let keys = || ChannelKeys {
            initiator_to_responder: SessionKey::from_bytes([0x11; 32]),
            responder_to_initiator: SessionKey::from_bytes([0x22; 32]),
        };
        let initiator = SecureChannel::new(
            ChannelRole::Initiator,
            session_id.clone(),
            responder_id.public_key(),
            keys(),
        );
        let responder = SecureChannel::new(
            ChannelRole::Responder,
            session_id,
            initiator_id.public_key(),
            keys(),
        );
        (initiator, responder)
    }

    #[test]
    fn test_bidirectional_roundtrip() {
        let (mut a, mut b) = channel_pair();

        let frame = a.encrypt(b"hello").unwrap();
        assert_eq!(frame.len(), 5 + FRAME_OVERHEAD);
        assert_eq!(b.decrypt(&frame).unwrap(), b"hello");

        let reply = b.encrypt(b"world").unwrap();
        assert_eq!(a.decrypt(&reply).unwrap(), b"world");

        assert_eq!(a.tx_counter(), 1);
        assert_eq!(a.rx_counter(), 1);
    }

    #[test]
    fn test_reflected_frame_rejected() {
        let (mut a, _) = channel_pair();
        let frame = a.encrypt(b"hello").unwrap();
        // A's own frame uses the other directional key
        assert!(matches!(a.decrypt(&frame), Err(CoreError::DecryptionFailed)));
    }

    #[test]
    fn test_out_of_order_and_replay_rejected() {
        let (mut a, mut b) = channel_pair();
        let first = a.encrypt(b"one").unwrap();
        let second = a.encrypt(b"two").unwrap();

        assert!(matches!(b.decrypt(&second), Err(CoreError::DecryptionFailed)));
        // Failed attempt did not advance the receive counter
        assert_eq!(b.rx_counter(), 0);
        assert_eq!(b.decrypt(&first).unwrap(), b"one");
        assert!(matches!(b.decrypt(&first), Err(CoreError::DecryptionFailed)));
        assert_eq!(b.decrypt(&second).unwrap(), b"two");
    }

    #[test]
    fn test_tampered_frame_rejected() {
        let (mut a, mut b) = channel_pair();
        let mut frame = a.encrypt(b"payload").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(b.decrypt(&frame), Err(CoreError::DecryptionFailed)));
        assert!(matches!(b.decrypt(&[0u8; 4]), Err(CoreError::DecryptionFailed)));
    }

    #[test]
    fn test_session_id_bound() {
        let (mut a, _) = channel_pair();
        let (_, mut other_session) = channel_pair();
        let frame = a.encrypt(b"payload").unwrap();
        assert!(other_session.decrypt(&frame).is_err());
    }

    #[test]
    fn test_base64_helpers() {
        let (mut a, mut b) = channel_pair();
        let encoded = a.encrypt_to_base64(b"{}").unwrap();
        assert_eq!(b.decrypt_from_base64(&encoded).unwrap(), b"{}");
        assert!(matches!(
            b.decrypt_from_base64("!!!"),
            Err(CoreError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let (mut a, mut b) = channel_pair();
        let frame = a.encrypt(b"").unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD);
        assert!(b.decrypt(&frame).unwrap().is_empty());
    }
}
