// ============================================
// File: crates/slashauth-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Key types used by the signing layer and the secure channel, with
//! zeroize-on-drop and constant-time comparison where it matters.
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: Long-term Ed25519 identity of a caller or responder
//! - `IdentityPublicKey`: The durable identifier, hex on the wire
//! - `EphemeralKeyPair`: Per-handshake X25519 key exchange keys
//! - `SessionKey`: One direction's derived channel key
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (Long-term)                               │
//! │  ├─ Signs request envelopes and handshake messages         │
//! │  └─ Its public half is the caller's identifier             │
//! │                                                            │
//! │  EphemeralKeyPair (Per-handshake)                          │
//! │  ├─ Generated fresh for each handshake                     │
//! │  └─ Consumed by the X25519 exchange                        │
//! │                                                            │
//! │  SessionKey (Per-direction, per-connection)                │
//! │  └─ Discarded when the channel is dropped                  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys should NEVER be logged
//! - The wire form of a public key is lowercase hex (64 characters)
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CHACHA20_KEY_SIZE, ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// IdentityKeyPair (Ed25519)
// ============================================

/// Long-term Ed25519 identity key pair.
///
/// # Example
/// ```
/// use slashauth_core::crypto::IdentityKeyPair;
///
/// let identity = IdentityKeyPair::generate();
/// let signature = identity.sign(b"nonce:data");
/// assert!(identity.public_key().verify(b"nonce:data", &signature).is_ok());
/// ```
#[derive(Clone)]
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Generates a new random identity key pair from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates an identity key pair from a 32-byte Ed25519 seed.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the length is not 32.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut seed: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "Ed25519 seed must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Returns the public key component.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.signing_key.verifying_key())
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Returns the public key in its wire form (lowercase hex).
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Signs a message (deterministic Ed25519).
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; ED25519_SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Exports the private seed for storage in a key file.
    ///
    /// # Security Warning
    /// Zero the returned bytes after use.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ============================================
// IdentityPublicKey
// ============================================

/// Public component of an Ed25519 identity key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdentityPublicKey(VerifyingKey);

impl std::hash::Hash for IdentityPublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state);
    }
}

impl IdentityPublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; ED25519_PUBLIC_KEY_SIZE]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| CoreError::invalid_key("Invalid Ed25519 public key"))
    }

    /// Parses the hex wire form.
    ///
    /// # Errors
    /// Returns `InvalidKey` for bad hex, wrong length or an invalid point.
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value)
            .map_err(|_| CoreError::invalid_key("public key is not valid hex"))?;
        let arr: [u8; ED25519_PUBLIC_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "public key must be {ED25519_PUBLIC_KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Self::from_bytes(&arr)
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Returns the raw public key bytes (owned).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Returns the hex wire form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    /// Verifies a signature against this public key.
    ///
    /// # Errors
    /// Returns `InvalidSignature` if verification fails.
    pub fn verify(&self, message: &[u8], signature: &[u8; ED25519_SIGNATURE_SIZE]) -> Result<()> {
        let sig = Signature::from_bytes(signature);
        self.0
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.as_bytes();
        write!(
            f,
            "IdentityPublicKey({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

impl fmt::Display for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for IdentityPublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for IdentityPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(self.0.as_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for IdentityPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let arr: [u8; ED25519_PUBLIC_KEY_SIZE] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| serde::de::Error::invalid_length(bytes.len(), &"32 bytes"))?;
            Self::from_bytes(&arr).map_err(serde::de::Error::custom)
        }
    }
}

// ============================================
// EphemeralKeyPair (X25519)
// ============================================

/// Ephemeral X25519 key pair, consumed by a single exchange.
///
/// # Example
/// ```
/// use slashauth_core::crypto::EphemeralKeyPair;
///
/// let alice = EphemeralKeyPair::generate();
/// let bob = EphemeralKeyPair::generate();
/// let alice_public = alice.public_key_bytes();
/// let bob_public = bob.public_key_bytes();
///
/// assert_eq!(
///     alice.exchange(&bob_public).unwrap(),
///     bob.exchange(&alice_public).unwrap()
/// );
/// ```
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generates a new random ephemeral key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Performs the Diffie-Hellman exchange, consuming the secret.
    ///
    /// # Errors
    /// `HandshakeFailed` if the peer key is low-order and the shared secret
    /// carries no contribution from our secret.
    pub fn exchange(self, peer_public: &[u8; X25519_PUBLIC_KEY_SIZE]) -> Result<[u8; 32]> {
        let peer_key = X25519PublicKey::from(*peer_public);
        let shared = self.secret.diffie_hellman(&peer_key);
        if !shared.was_contributory() {
            return Err(CoreError::handshake("non-contributory ephemeral key"));
        }
        Ok(*shared.as_bytes())
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.public.as_bytes();
        f.debug_struct("EphemeralKeyPair")
            .field(
                "public",
                &format_args!("{:02x}{:02x}{:02x}{:02x}...", bytes[0], bytes[1], bytes[2], bytes[3]),
            )
            .finish_non_exhaustive()
    }
}

// ============================================
// SessionKey
// ============================================

/// Symmetric key for one direction of a secure channel.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; CHACHA20_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; CHACHA20_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; CHACHA20_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionKey {}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keypair_generation() {
        let kp1 = IdentityKeyPair::generate();
        let kp2 = IdentityKeyPair::generate();
        assert_ne!(kp1.public_key_bytes(), kp2.public_key_bytes());
    }

    #[test]
    fn test_identity_sign_verify() {
        let kp = IdentityKeyPair::generate();
        let signature = kp.sign(b"test message");
        assert!(kp.public_key().verify(b"test message", &signature).is_ok());
        assert!(matches!(
            kp.public_key().verify(b"wrong message", &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_identity_keypair_seed_roundtrip() {
        let kp = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());

        assert!(IdentityKeyPair::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_public_key_hex_form() {
        let kp = IdentityKeyPair::generate();
        let hex_key = kp.public_key_hex();
        assert_eq!(hex_key.len(), 64);
        assert_eq!(hex_key, hex_key.to_lowercase());

        let parsed = IdentityPublicKey::from_hex(&hex_key).unwrap();
        assert_eq!(parsed, kp.public_key());

        assert!(IdentityPublicKey::from_hex("zz").is_err());
        assert!(IdentityPublicKey::from_hex(&hex_key[..62]).is_err());
    }

    #[test]
    fn test_ephemeral_key_exchange() {
        let alice = EphemeralKeyPair::generate();
        let bob = EphemeralKeyPair::generate();
        let alice_pub = alice.public_key_bytes();
        let bob_pub = bob.public_key_bytes();
        assert_eq!(alice.exchange(&bob_pub).unwrap(), bob.exchange(&alice_pub).unwrap());
    }

    #[test]
    fn test_low_order_peer_key_rejected() {
        // Identity point and a point of order 8
        let zero = [0u8; X25519_PUBLIC_KEY_SIZE];
        let mut one = [0u8; X25519_PUBLIC_KEY_SIZE];
        one[0] = 1;

        for peer in [zero, one] {
            assert!(matches!(
                EphemeralKeyPair::generate().exchange(&peer),
                Err(CoreError::HandshakeFailed { .. })
            ));
        }
    }

    #[test]
    fn test_session_key_debug_redacted() {
        let key = SessionKey::from_bytes([0x42; 32]);
        assert_eq!(format!("{key:?}"), "SessionKey([REDACTED])");
        assert_eq!(key, SessionKey::from_bytes([0x42; 32]));
        assert_ne!(key, SessionKey::from_bytes([0x43; 32]));
    }

    #[test]
    fn test_identity_public_key_serialization() {
        let public = IdentityKeyPair::generate().public_key();
        let json = serde_json::to_string(&public).unwrap();
        assert_eq!(json, format!("\"{}\"", public.to_hex()));
        let restored: IdentityPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(public, restored);
    }
}
