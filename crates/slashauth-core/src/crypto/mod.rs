// ============================================
// File: crates/slashauth-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Every cryptographic step of SlashAuth lives here, built on audited
//! RustCrypto / dalek implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Key types and generation (Ed25519, X25519)
//! - [`signer`]: Canonical signing form and the `CryptoProvider` seam
//! - [`handshake`]: One-round-trip mutually authenticated handshake
//! - [`channel`]: Per-direction ChaCha20-Poly1305 channel with counters
//! - [`kdf`]: Directional key derivation (HKDF-SHA256)
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Initiator                                   Responder      │
//! │    │  (knows responder static key from the challenge URL)   │
//! │    │                                              │         │
//! │    │  Ed25519 static key + X25519 ephemeral ────► │         │
//! │    │  timestamp + signature ────────────────────► │         │
//! │    │                                              │         │
//! │    │ ◄──────── Ed25519 static key + X25519 ephemeral        │
//! │    │ ◄──────── session id + signature (binds initiator)     │
//! │    │                                              │         │
//! │    │        X25519 ──► HKDF-SHA256                │         │
//! │    │              ├──► initiator→responder key    │         │
//! │    │              └──► responder→initiator key    │         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Channel Phase                            │
//! │   Direction Key + Counter ──► ChaCha20-Poly1305 ──► Frame   │
//! │   (AAD = session id, counter must advance by exactly one)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own crypto
//! - ALL sensitive keys implement Zeroize
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod channel;
pub mod handshake;
pub mod kdf;
pub mod keys;
pub mod signer;

pub use channel::{ChannelRole, SecureChannel};
pub use handshake::{DefaultHandshakeCrypto, HandshakeCrypto, InitiatorHandshake};
pub use keys::{EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKey};
pub use signer::{
    canonicalize, nonce_timestamp, sign_canonical, timestamped_nonce, verify_canonical,
    verify_signature, CryptoProvider, DefaultCryptoProvider,
};

// ============================================
// Constants
// ============================================

/// Size of Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of ChaCha20-Poly1305 key in bytes.
pub const CHACHA20_KEY_SIZE: usize = 32;

/// Size of ChaCha20-Poly1305 nonce in bytes.
pub const CHACHA20_NONCE_SIZE: usize = 12;

/// Size of Poly1305 authentication tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;

/// Size of the random nonces produced by [`CryptoProvider::create_nonce`].
pub const NONCE_SIZE: usize = 32;

/// HKDF salt for channel key derivation.
pub const HKDF_SALT: &[u8] = b"slashauth-v1";

/// HKDF info label for the initiator→responder key.
pub const HKDF_LABEL_INITIATOR: &[u8] = b"slashauth-initiator-to-responder";

/// HKDF info label for the responder→initiator key.
pub const HKDF_LABEL_RESPONDER: &[u8] = b"slashauth-responder-to-initiator";
