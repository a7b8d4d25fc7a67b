// ============================================
// File: crates/slashauth-core/src/crypto/signer.rs
// ============================================
//! # Signer / Verifier
//!
//! ## Creation Reason
//! Every signed artifact of the protocol (request proofs and server
//! responses) goes through a single canonical form, so signer and
//! verifier can never disagree about which bytes were signed.
//!
//! ## Main Functionality
//! - `canonicalize(nonce, data)`: UTF-8 bytes of `nonce + ":" + data`
//! - `CryptoProvider`: sign / verify / create_nonce capability, injectable
//! - `DefaultCryptoProvider`: Ed25519 + OS RNG
//! - `sign_canonical` / `verify_canonical`: hex-level helpers used by the
//!   protocol engines
//! - `timestamped_nonce` / `nonce_timestamp`: client nonces for
//!   `requestToken` that carry their issue time
//!
//! ## Signed Content
//! ```text
//! ┌──────────────────┬──────────────────┬───────────────────────┐
//! │ Method           │ nonce            │ data                  │
//! ├──────────────────┼──────────────────┼───────────────────────┤
//! │ requestToken     │ fresh client     │ caller public key hex │
//! │ authz            │ the token        │ caller public key hex │
//! │ magiclink        │ the token        │ caller public key hex │
//! │ response         │ request nonce    │ canonical result JSON │
//! └──────────────────┴──────────────────┴───────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No other byte layout may be signed anywhere in the protocol
//! - Malformed signature hex is reported as `InvalidSignature`, same as a
//!   signature that does not verify
//! - The issue time sits inside the signed nonce, so it cannot be moved
//!   forward without invalidating the signature
//!
//! ## Last Modified
//! v0.1.0 - Initial signer
//! v0.1.1 - Timestamped requestToken nonces

use rand::rngs::OsRng;
use rand::RngCore;

use slashauth_common::time::Timestamp;

use super::keys::{IdentityKeyPair, IdentityPublicKey};
use super::{ED25519_SIGNATURE_SIZE, NONCE_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Canonical Form
// ============================================

/// Builds the canonical signing bytes for a `(nonce, data)` pair.
///
/// ```
/// use slashauth_core::crypto::canonicalize;
/// assert_eq!(canonicalize("abc", "123"), b"abc:123".to_vec());
/// ```
#[must_use]
pub fn canonicalize(nonce: &str, data: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(nonce.len() + 1 + data.len());
    out.extend_from_slice(nonce.as_bytes());
    out.push(b':');
    out.extend_from_slice(data.as_bytes());
    out
}

// ============================================
// CryptoProvider
// ============================================

/// Signing capability used by the protocol engines.
///
/// Engines hold an `Arc<dyn CryptoProvider>`; tests substitute fixed nonces
/// or failing verifiers through this seam.
pub trait CryptoProvider: Send + Sync + std::fmt::Debug {
    /// Produces a detached signature over `data`.
    fn sign(&self, data: &[u8], identity: &IdentityKeyPair) -> [u8; ED25519_SIGNATURE_SIZE];

    /// Checks a detached signature. Never fails loudly; a malformed
    /// signature is simply `false`.
    fn verify(&self, signature: &[u8], data: &[u8], public_key: &IdentityPublicKey) -> bool;

    /// Returns a fresh random nonce as lowercase hex.
    fn create_nonce(&self) -> String;
}

/// Ed25519 provider backed by the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCryptoProvider;

impl CryptoProvider for DefaultCryptoProvider {
    fn sign(&self, data: &[u8], identity: &IdentityKeyPair) -> [u8; ED25519_SIGNATURE_SIZE] {
        identity.sign(data)
    }

    fn verify(&self, signature: &[u8], data: &[u8], public_key: &IdentityPublicKey) -> bool {
        let Ok(sig) = <[u8; ED25519_SIGNATURE_SIZE]>::try_from(signature) else {
            return false;
        };
        public_key.verify(data, &sig).is_ok()
    }

    fn create_nonce(&self) -> String {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        hex::encode(nonce)
    }
}

// ============================================
// Hex-level helpers
// ============================================

/// Signs `canonicalize(nonce, data)` and returns the signature as hex.
pub fn sign_canonical(
    provider: &dyn CryptoProvider,
    identity: &IdentityKeyPair,
    nonce: &str,
    data: &str,
) -> String {
    hex::encode(provider.sign(&canonicalize(nonce, data), identity))
}

/// Verifies a hex signature over `canonicalize(nonce, data)`.
///
/// # Errors
/// `InvalidSignature` when the hex is malformed or the signature does not
/// verify under `public_key`.
pub fn verify_canonical(
    provider: &dyn CryptoProvider,
    signature_hex: &str,
    nonce: &str,
    data: &str,
    public_key: &IdentityPublicKey,
) -> Result<()> {
    let signature = hex::decode(signature_hex).map_err(|_| CoreError::InvalidSignature)?;
    verify_signature(provider, &signature, &canonicalize(nonce, data), public_key)
}

/// Raising form of [`CryptoProvider::verify`].
///
/// # Errors
/// `InvalidSignature` if the signature does not verify.
pub fn verify_signature(
    provider: &dyn CryptoProvider,
    signature: &[u8],
    data: &[u8],
    public_key: &IdentityPublicKey,
) -> Result<()> {
    if provider.verify(signature, data, public_key) {
        Ok(())
    } else {
        Err(CoreError::InvalidSignature)
    }
}

// ============================================
// Timestamped nonces
// ============================================

/// Fresh nonce of the form `<unix secs>.<random hex>`.
///
/// ```
/// use slashauth_core::crypto::{nonce_timestamp, timestamped_nonce, DefaultCryptoProvider};
///
/// let nonce = timestamped_nonce(&DefaultCryptoProvider);
/// assert!(nonce_timestamp(&nonce).unwrap().is_recent(5));
/// ```
#[must_use]
pub fn timestamped_nonce(provider: &dyn CryptoProvider) -> String {
    format!("{}.{}", Timestamp::now().as_secs(), provider.create_nonce())
}

/// Issue time carried by a [`timestamped_nonce`], or `None` if `nonce`
/// does not have that shape.
#[must_use]
pub fn nonce_timestamp(nonce: &str) -> Option<Timestamp> {
    let (secs, random) = nonce.split_once('.')?;
    if random.is_empty() || !random.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    secs.parse::<i64>().ok().map(Timestamp::from_secs)
}

// ============================================
// Tests
// ============================================
