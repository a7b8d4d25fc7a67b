// ============================================
// File: crates/slashauth-core/src/crypto/handshake.rs
// ============================================
//! # Handshake Cryptography
//!
//! ## Creation Reason
//! Establishes a [`SecureChannel`] in one round trip. The initiator already
//! knows the responder's static key (from the challenge URL); the responder
//! learns the initiator's static key from the first message.
//!
//! ## Main Functionality
//! - `initiate`: build a signed `ClientHello` plus pending initiator state
//! - `respond`: verify a `ClientHello`, answer with a `ServerHello`, open
//!   the responder's channel
//! - `complete_initiator`: verify the `ServerHello` against the expected
//!   responder key and open the initiator's channel
//! - `HandshakeCrypto`: responder-side seam used by the server
//!
//! ## Handshake Flow
//! ```text
//! Initiator                                       Responder
//!   │                                               │
//!   │  ClientHello                                  │
//!   │  ├─ client_public_key (Ed25519)               │
//!   │  ├─ client_ephemeral_key (X25519)             │
//!   │  ├─ timestamp                                 │
//!   │  └─ signature ─────────────────────────────►  │
//!   │                                               │
//!   │                      Check version/timestamp  │
//!   │                      Verify signature         │
//!   │                      Generate ephemeral       │
//!   │                      Derive channel keys      │
//!   │                                               │
//!   │                                  ServerHello  │
//!   │  ◄──────────────────────────────── signature  │
//!   │                 server_public_key (Ed25519)   │
//!   │                 server_ephemeral_key (X25519) │
//!   │                 session_id                    │
//!   │                                               │
//!   │  Check responder key == expected              │
//!   │  Verify signature, derive channel keys        │
//!   │                                               │
//!   │ ════════════ SecureChannel ═════════════════  │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Signature data must be constructed in exact order (see `messages.rs`)
//! - Every rejection surfaces as `HandshakeFailed` except a stale
//!   timestamp, which is `InvalidTimestamp`
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake implementation

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use slashauth_common::time::{Timestamp, MAX_CLOCK_SKEW_SECS};
use slashauth_common::types::SessionId;

use crate::crypto::channel::{ChannelRole, SecureChannel};
use crate::crypto::kdf::{derive_channel_keys, Transcript};
use crate::crypto::keys::{EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey};
use crate::error::{CoreError, Result};
use crate::protocol::{ClientHello, ProtocolVersion, ServerHello, CURRENT_PROTOCOL_VERSION};

// ============================================
// HandshakeCrypto Trait
// ============================================

/// Responder-side handshake operations.
///
/// # Example
/// ```
/// use slashauth_core::crypto::{handshake, DefaultHandshakeCrypto, HandshakeCrypto, IdentityKeyPair};
///
/// let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
/// let client = IdentityKeyPair::generate();
///
/// let (hello, pending) = handshake::initiate(&client, &server.public_key());
/// let (reply, mut server_channel) = server.respond(&hello).unwrap();
/// let mut client_channel = handshake::complete_initiator(&reply, pending).unwrap();
///
/// let frame = client_channel.encrypt(b"ping").unwrap();
/// assert_eq!(server_channel.decrypt(&frame).unwrap(), b"ping");
/// ```
pub trait HandshakeCrypto: Send + Sync {
    /// Returns the responder's static public key.
    fn public_key(&self) -> IdentityPublicKey;

    /// Verifies a ClientHello and returns the initiator's static key.
    ///
    /// # Errors
    /// - `HandshakeFailed`: bad version, bad key or bad signature
    /// - `InvalidTimestamp`: timestamp outside the accepted skew
    fn verify_client_hello(&self, msg: &ClientHello) -> Result<IdentityPublicKey>;

    /// Verifies a ClientHello and produces the signed ServerHello plus the
    /// responder's channel.
    ///
    /// # Errors
    /// As [`verify_client_hello`](Self::verify_client_hello), plus
    /// `KeyDerivation`.
    fn respond(&self, client_hello: &ClientHello) -> Result<(ServerHello, SecureChannel)>;
}

// ============================================
// DefaultHandshakeCrypto
// ============================================

/// Ed25519/X25519 responder.
#[derive(Debug, Clone)]
pub struct DefaultHandshakeCrypto {
    identity: IdentityKeyPair,
    max_timestamp_skew: u64,
}

impl DefaultHandshakeCrypto {
    /// Creates a responder for the given static identity.
    #[must_use]
    pub fn new(identity: IdentityKeyPair) -> Self {
        debug!(public_key = %identity.public_key(), "Handshake responder created");
        Self {
            identity,
            max_timestamp_skew: MAX_CLOCK_SKEW_SECS,
        }
    }

    /// Sets the maximum allowed timestamp skew in seconds.
    #[must_use]
    pub fn with_timestamp_skew(mut self, seconds: u64) -> Self {
        self.max_timestamp_skew = seconds;
        self
    }

    /// The responder's static identity.
    #[must_use]
    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }
}

impl HandshakeCrypto for DefaultHandshakeCrypto {
    fn public_key(&self) -> IdentityPublicKey {
        self.identity.public_key()
    }

    fn verify_client_hello(&self, msg: &ClientHello) -> Result<IdentityPublicKey> {
        if !ProtocolVersion::new(msg.version).is_supported() {
            return Err(CoreError::handshake(format!(
                "unsupported protocol version {}",
                msg.version
            )));
        }

        Timestamp::from_secs(msg.timestamp)
            .validate(self.max_timestamp_skew)
            .map_err(|e| CoreError::invalid_timestamp(e.to_string()))?;

        let client_public = IdentityPublicKey::from_bytes(&msg.client_public_key)
            .map_err(|_| CoreError::handshake("invalid initiator key"))?;
        client_public
            .verify(&msg.signing_data(), &msg.signature)
            .map_err(|_| {
                warn!(initiator = %client_public, "ClientHello signature rejected");
                CoreError::handshake("initiator signature invalid")
            })?;

        Ok(client_public)
    }

    fn respond(&self, client_hello: &ClientHello) -> Result<(ServerHello, SecureChannel)> {
        let client_public = self.verify_client_hello(client_hello)?;

        let ephemeral = EphemeralKeyPair::generate();
        let session_id = SessionId::generate();

        let mut server_hello = ServerHello::new(
            CURRENT_PROTOCOL_VERSION,
            self.identity.public_key_bytes(),
            ephemeral.public_key_bytes(),
            *session_id.as_bytes(),
        );
        server_hello.signature = self.identity.sign(&server_hello.signing_data(client_hello));

        let shared_secret = ephemeral.exchange(&client_hello.client_ephemeral_key)?;
        let keys = derive_channel_keys(
            &shared_secret,
            &Transcript {
                initiator_static: &client_hello.client_public_key,
                responder_static: &server_hello.server_public_key,
                initiator_ephemeral: &client_hello.client_ephemeral_key,
                responder_ephemeral: &server_hello.server_ephemeral_key,
            },
        )?;

        debug!(
            session_id = ?session_id,
            initiator = %client_public,
            "Handshake accepted"
        );

        Ok((
            server_hello,
            SecureChannel::new(ChannelRole::Responder, session_id, client_public, keys),
        ))
    }
}

// ============================================
// Initiator Side
// ============================================

/// Initiator state between sending the ClientHello and receiving the reply.
#[derive(Debug)]
pub struct InitiatorHandshake {
    ephemeral: EphemeralKeyPair,
    client_hello: ClientHello,
    expected_responder: IdentityPublicKey,
}

impl InitiatorHandshake {
    /// The ClientHello this state belongs to.
    #[must_use]
    pub fn client_hello(&self) -> &ClientHello {
        &self.client_hello
    }
}

/// Creates a signed ClientHello addressed to `remote_static`.
#[must_use]
pub fn initiate(
    local: &IdentityKeyPair,
    remote_static: &IdentityPublicKey,
) -> (ClientHello, InitiatorHandshake) {
    let ephemeral = EphemeralKeyPair::generate();

    let mut hello = ClientHello::new(
        CURRENT_PROTOCOL_VERSION,
        local.public_key_bytes(),
        ephemeral.public_key_bytes(),
        Timestamp::now().as_secs(),
    );
    hello.signature = local.sign(&hello.signing_data());

    let state = InitiatorHandshake {
        ephemeral,
        client_hello: hello.clone(),
        expected_responder: *remote_static,
    };
    (hello, state)
}

/// Responds to a ClientHello with the default responder and skew.
///
/// # Errors
/// See [`HandshakeCrypto::respond`].
pub fn respond(
    local: &IdentityKeyPair,
    client_hello: &ClientHello,
) -> Result<(ServerHello, SecureChannel)> {
    DefaultHandshakeCrypto::new(local.clone()).respond(client_hello)
}

/// Verifies the ServerHello and opens the initiator's channel.
///
/// # Errors
/// `HandshakeFailed` when the responder key differs from the expected
/// static key, the version is unsupported, or the signature is invalid.
pub fn complete_initiator(
    server_hello: &ServerHello,
    state: InitiatorHandshake,
) -> Result<SecureChannel> {
    if !ProtocolVersion::new(server_hello.version).is_supported() {
        return Err(CoreError::handshake(format!(
            "unsupported protocol version {}",
            server_hello.version
        )));
    }

    let expected = state.expected_responder.to_bytes();
    if !bool::from(server_hello.server_public_key.ct_eq(&expected)) {
        warn!(
            expected = %state.expected_responder,
            received = %hex::encode(server_hello.server_public_key),
            "Responder presented an unexpected static key"
        );
        return Err(CoreError::handshake("unexpected responder key"));
    }

    state
        .expected_responder
        .verify(&server_hello.signing_data(&state.client_hello), &server_hello.signature)
        .map_err(|_| CoreError::handshake("responder signature invalid"))?;

    let session_id = SessionId::from_bytes(&server_hello.session_id)
        .ok_or_else(|| CoreError::handshake("invalid session id"))?;

    let shared_secret = state.ephemeral.exchange(&server_hello.server_ephemeral_key)?;
    let keys = derive_channel_keys(
        &shared_secret,
        &Transcript {
            initiator_static: &state.client_hello.client_public_key,
            responder_static: &server_hello.server_public_key,
            initiator_ephemeral: &state.client_hello.client_ephemeral_key,
            responder_ephemeral: &server_hello.server_ephemeral_key,
        },
    )?;

    debug!(session_id = ?session_id, "Handshake completed");
    Ok(SecureChannel::new(
        ChannelRole::Initiator,
        session_id,
        state.expected_responder,
        keys,
    ))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn full_handshake(
        server: &DefaultHandshakeCrypto,
        client: &IdentityKeyPair,
    ) -> (SecureChannel, SecureChannel) {
        let (hello, pending) = initiate(client, &server.public_key());
        let (reply, server_channel) = server.respond(&hello).unwrap();
        let client_channel = complete_initiator(&reply, pending).unwrap();
        (client_channel, server_channel)
    }

    #[test]
    fn test_full_handshake() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        let (mut c, mut s) = full_handshake(&server, &client);

        assert_eq!(s.remote_static_key(), &client.public_key());
        assert_eq!(c.remote_static_key(), &server.public_key());
        assert_eq!(c.session_id(), s.session_id());

        let frame = c.encrypt(b"request").unwrap();
        assert_eq!(s.decrypt(&frame).unwrap(), b"request");
        let frame = s.encrypt(b"response").unwrap();
        assert_eq!(c.decrypt(&frame).unwrap(), b"response");
    }

    #[test]
    fn test_fresh_keys_per_run() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        let (mut c1, _) = full_handshake(&server, &client);
        let (_, mut s2) = full_handshake(&server, &client);

        // Same identities, new ephemerals: run 1 frames mean nothing to run 2
        let frame = c1.encrypt(b"hello").unwrap();
        assert!(s2.decrypt(&frame).is_err());
    }

    #[test]
    fn test_invalid_client_signature_rejected() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        let (mut hello, _) = initiate(&client, &server.public_key());
        hello.signature[0] ^= 0xFF;
        assert!(matches!(
            server.respond(&hello),
            Err(CoreError::HandshakeFailed { .. })
        ));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate()).with_timestamp_skew(30);
        let client = IdentityKeyPair::generate();
        let ephemeral = EphemeralKeyPair::generate();

        let mut hello = ClientHello::new(
            CURRENT_PROTOCOL_VERSION,
            client.public_key_bytes(),
            ephemeral.public_key_bytes(),
            Timestamp::now().as_secs() - 60,
        );
        hello.signature = client.sign(&hello.signing_data());

        assert!(matches!(
            server.verify_client_hello(&hello),
            Err(CoreError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_low_order_client_ephemeral_rejected() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        // Correctly signed, but the ephemeral is the identity point
        let mut hello = ClientHello::new(
            CURRENT_PROTOCOL_VERSION,
            client.public_key_bytes(),
            [0u8; 32],
            Timestamp::now().as_secs(),
        );
        hello.signature = client.sign(&hello.signing_data());

        assert!(matches!(
            server.respond(&hello),
            Err(CoreError::HandshakeFailed { .. })
        ));
    }

    #[test]
    fn test_unexpected_responder_key_rejected() {
        let real_server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let impostor = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        let (hello, pending) = initiate(&client, &real_server.public_key());
        let (reply, _) = impostor.respond(&hello).unwrap();

        assert!(matches!(
            complete_initiator(&reply, pending),
            Err(CoreError::HandshakeFailed { .. })
        ));
    }

    #[test]
    fn test_tampered_server_hello_rejected() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        let (hello, pending) = initiate(&client, &server.public_key());
        let (mut reply, _) = server.respond(&hello).unwrap();
        reply.session_id[0] ^= 0x01;

        assert!(matches!(
            complete_initiator(&reply, pending),
            Err(CoreError::HandshakeFailed { .. })
        ));
    }

    #[test]
    fn test_reply_bound_to_client_hello() {
        let server = DefaultHandshakeCrypto::new(IdentityKeyPair::generate());
        let client = IdentityKeyPair::generate();

        let (hello_a, _pending_a) = initiate(&client, &server.public_key());
        let (_hello_b, pending_b) = initiate(&client, &server.public_key());
        let (reply_a, _) = server.respond(&hello_a).unwrap();

        // A reply to one ClientHello cannot complete another
        assert!(complete_initiator(&reply_a, pending_b).is_err());
    }

    #[test]
    fn test_free_respond_uses_identity() {
        let server_id = IdentityKeyPair::generate();
        let client = IdentityKeyPair::generate();
        let (hello, pending) = initiate(&client, &server_id.public_key());
        let (reply, _) = respond(&server_id, &hello).unwrap();
        assert!(complete_initiator(&reply, pending).is_ok());
    }
}
