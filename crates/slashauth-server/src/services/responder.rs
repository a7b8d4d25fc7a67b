// ============================================
// File: crates/slashauth-server/src/services/responder.rs
// ============================================
//! # Responder Slot
//!
//! Holds the identity the server answers handshakes with. Rotation builds
//! a fresh responder and swaps the `Arc` in the slot; a connection that
//! already took the old `Arc` keeps using it until it closes.
//!
//! ```text
//!  handshake ──► current() ──► Arc<A> ──► channel (A)
//!  requestToken ──► rotate() ──► slot = Arc<B>, reply newResponderKey = B
//!  next handshake ──► current() ──► Arc<B>
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use slashauth_core::crypto::{
    DefaultHandshakeCrypto, HandshakeCrypto, IdentityKeyPair, IdentityPublicKey,
};

/// Replaceable current responder.
#[derive(Debug)]
pub struct ResponderSlot {
    current: RwLock<Arc<DefaultHandshakeCrypto>>,
    max_timestamp_skew: u64,
}

impl ResponderSlot {
    /// Starts with `identity` as the responder.
    #[must_use]
    pub fn new(identity: IdentityKeyPair, max_timestamp_skew: u64) -> Self {
        let responder = DefaultHandshakeCrypto::new(identity).with_timestamp_skew(max_timestamp_skew);
        Self {
            current: RwLock::new(Arc::new(responder)),
            max_timestamp_skew,
        }
    }

    /// Snapshot of the current responder.
    #[must_use]
    pub fn current(&self) -> Arc<DefaultHandshakeCrypto> {
        Arc::clone(&self.current.read())
    }

    /// Static key clients must expect from the next handshake.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        self.current.read().public_key()
    }

    /// Replaces the responder with a freshly generated identity and
    /// returns its public key.
    pub fn rotate(&self) -> IdentityPublicKey {
        let next = Arc::new(
            DefaultHandshakeCrypto::new(IdentityKeyPair::generate())
                .with_timestamp_skew(self.max_timestamp_skew),
        );
        let public_key = next.public_key();
        *self.current.write() = next;
        info!(responder = %public_key, "Responder key rotated");
        public_key
    }
}
