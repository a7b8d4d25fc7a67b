// ============================================
// File: crates/slashauth-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Main Functionality
//! - `SessionId`: 16-byte identifier of one secure-channel session, used as
//!   AEAD associated data so ciphertexts cannot move between sessions
//! - `abbreviate`: keeps public keys and tokens short in log lines
//!
//! ## ⚠️ Important Note for Next Developer
//! - SessionId is security-relevant - always use a cryptographically secure RNG
//! - SessionId zeroizes on drop, so it is `Clone` but not `Copy`
//!
//! ## Last Modified
//! v0.1.0 - Initial types

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of SessionId in bytes
pub const SESSION_ID_SIZE: usize = 16;

/// Number of characters kept by [`abbreviate`].
pub const LOG_PREFIX_LEN: usize = 8;

// ============================================
// SessionId
// ============================================

/// Unique identifier for one secure-channel session.
///
/// # Wire Format
/// ```text
/// ┌────────────────────────────────────┐
/// │       Session ID (16 bytes)        │
/// │  Chosen by the responder, bound    │
/// │  into every AEAD frame as AAD      │
/// └────────────────────────────────────┘
/// ```
///
/// # Example
/// ```
/// use slashauth_common::types::SessionId;
///
/// let session_id = SessionId::generate();
/// let restored = SessionId::from_bytes(session_id.as_bytes()).unwrap();
/// assert_eq!(session_id, restored);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Zeroize)]
pub struct SessionId([u8; SESSION_ID_SIZE]);

impl Drop for SessionId {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl SessionId {
    /// Creates a `SessionId` from raw bytes, or `None` if the length is not 16.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; SESSION_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    /// Generates a new cryptographically random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = [0u8; SESSION_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Returns the raw bytes of the session ID.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionId({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

impl FromStr for SessionId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64.decode(s)?;
        Self::from_bytes(&bytes)
            .ok_or_else(|| CommonError::invalid_length(SESSION_ID_SIZE, bytes.len()))
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Log helpers
// ============================================

/// Returns at most the first [`LOG_PREFIX_LEN`] characters of `value`.
///
/// Used wherever a public key or token ends up in a log line.
#[must_use]
pub fn abbreviate(value: &str) -> &str {
    match value.char_indices().nth(LOG_PREFIX_LEN) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

// ============================================
// Tests
// ============================================
