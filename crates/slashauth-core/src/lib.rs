// ============================================
// File: crates/slashauth-core/src/lib.rs
// ============================================
//! # SlashAuth Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Holds everything the client and the server must agree on byte for byte:
//! the canonical signing form, the handshake, the secure channel frames and
//! the JSON envelopes.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`IdentityKeyPair`, `IdentityPublicKey`, `EphemeralKeyPair`)
//! - Signer/Verifier over `nonce:data`
//! - Handshake cryptography (signatures, key exchange)
//! - Directional channel encryption (ChaCha20-Poly1305, HKDF-SHA256)
//!
//! ### Protocol Module ([`protocol`])
//! - Handshake messages (`ClientHello`, `ServerHello`) and their codec
//! - Request/response envelopes and the method set
//! - Challenge URL format
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │      slashauth-server        slashauth-client       │
//! │             │   \              /    │               │
//! │             │    ▼            ▼     │               │
//! │             │   slashauth-core      │               │
//! │             │   You are here        │               │
//! │             ▼         │             ▼               │
//! │      slashauth-transport ◄──────────┘               │
//! │                   │   │                             │
//! │                   ▼   ▼                             │
//! │             slashauth-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Authenticity**: Ed25519 signatures on requests, responses and handshakes
//! - **Confidentiality**: ChaCha20-Poly1305 on every channel frame
//! - **Forward Secrecy**: X25519 ephemeral key exchange per channel
//! - **Replay Protection**: Strict per-direction frame counters
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto / dalek implementations
//! - The canonical form (`nonce:data`) and JSON key order are wire contracts
//! - ALL keys MUST implement Zeroize for secure cleanup
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{
    CryptoProvider, DefaultCryptoProvider, DefaultHandshakeCrypto, EphemeralKeyPair,
    HandshakeCrypto, IdentityKeyPair, IdentityPublicKey, SecureChannel, SessionKey,
};
pub use error::{CoreError, Result};
pub use protocol::{
    AuthzGrant, ChallengeUrl, ChannelMode, ClientHello, MagicLink, Method, ProtocolVersion,
    RequestEnvelope, ResponseEnvelope, ServerHello, CURRENT_PROTOCOL_VERSION,
};
