// ============================================
// File: crates/slashauth-server/src/services/nonce_guard.rs
// ============================================
//! # Nonce Guard
//!
//! ## Creation Reason
//! A plain-mode `requestToken` proves key possession by signing a
//! client-chosen nonce. Without a freshness check a captured request could
//! be replayed to overwrite the owner's outstanding token at will.
//!
//! ## Main Functionality
//! - `NonceGuard`: time window plus seen-set for `requestToken` nonces
//!
//! ## Acceptance Rule
//! ```text
//! nonce = "<unix secs>.<random hex>"
//!
//! 1. shape invalid                      → Reject
//! 2. |secs - now| > window              → Reject (stale)
//! 3. (owner, nonce) already seen        → Reject (replay)
//! 4. otherwise                          → Accept, remember (owner, nonce)
//! ```
//! A remembered entry is only dropped once rule 2 rejects it anyway, so
//! pruning never reopens a replay.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Check AFTER the signature: unsigned junk must not fill the seen-set
//! - The guard is per process; multi-instance deployments need sticky
//!   routing or a shared store
//!
//! ## Last Modified
//! v0.1.1 - Initial nonce guard

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use slashauth_common::abbreviate;
use slashauth_common::time::Timestamp;
use slashauth_core::crypto::nonce_timestamp;

use crate::error::{Result, ServerError};

/// Seen-set size above which expired entries are swept.
const PRUNE_THRESHOLD: usize = 4096;

/// Rejects stale and repeated `requestToken` nonces.
#[derive(Debug)]
pub struct NonceGuard {
    seen: DashMap<String, Timestamp>,
    window_secs: u64,
}

impl NonceGuard {
    /// Accepts nonces issued within `window_secs` of now.
    #[must_use]
    pub fn new(window_secs: u64) -> Self {
        Self {
            seen: DashMap::new(),
            window_secs,
        }
    }

    /// Admits `nonce` for `owner` exactly once.
    ///
    /// # Errors
    /// `InvalidNonce` if the nonce is malformed, outside the window, or
    /// was already admitted for this owner.
    pub fn check(&self, owner: &str, nonce: &str) -> Result<()> {
        let Some(issued) = nonce_timestamp(nonce) else {
            warn!(owner = abbreviate(owner), "Malformed requestToken nonce");
            return Err(ServerError::InvalidNonce);
        };

        if let Err(e) = issued.validate(self.window_secs) {
            warn!(owner = abbreviate(owner), error = %e, "Stale requestToken nonce");
            return Err(ServerError::InvalidNonce);
        }

        if self.seen.len() >= PRUNE_THRESHOLD {
            self.prune();
        }

        match self.seen.entry(format!("{owner}:{nonce}")) {
            Entry::Occupied(_) => {
                warn!(owner = abbreviate(owner), "Replayed requestToken nonce");
                Err(ServerError::InvalidNonce)
            }
            Entry::Vacant(slot) => {
                slot.insert(issued);
                Ok(())
            }
        }
    }

    /// Number of remembered nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn prune(&self) {
        let before = self.seen.len();
        self.seen.retain(|_, issued| issued.is_recent(self.window_secs));
        debug!(removed = before - self.seen.len(), "Pruned expired nonces");
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "4f1c0e4ce7e1a5b1a3c3d1d7a2f8e9b0c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1";

    fn nonce_at(offset_secs: i64, random: &str) -> String {
        format!("{}.{random}", Timestamp::now().as_secs() + offset_secs)
    }

    #[test]
    fn test_fresh_nonce_admitted_once() {
        let guard = NonceGuard::new(30);
        let nonce = nonce_at(0, "aa01");

        assert!(guard.check(OWNER, &nonce).is_ok());
        assert!(matches!(guard.check(OWNER, &nonce), Err(ServerError::InvalidNonce)));

        // Same nonce from another key is a different request
        assert!(guard.check("other", &nonce).is_ok());
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_stale_and_malformed_rejected() {
        let guard = NonceGuard::new(30);

        assert!(guard.check(OWNER, &nonce_at(-120, "aa01")).is_err());
        assert!(guard.check(OWNER, &nonce_at(120, "aa02")).is_err());
        assert!(guard.check(OWNER, "client-nonce").is_err());
        assert!(guard.is_empty());
    }

    #[test]
    fn test_prune_keeps_fresh_entries() {
        let guard = NonceGuard::new(30);
        for i in 0..PRUNE_THRESHOLD {
            guard
                .seen
                .insert(format!("{OWNER}:old{i}"), Timestamp::from_secs(Timestamp::now().as_secs() - 600));
        }
        let fresh = nonce_at(0, "beef");
        guard.check(OWNER, &fresh).unwrap();

        assert_eq!(guard.len(), 1);
        assert!(guard.check(OWNER, &fresh).is_err());
    }
}
