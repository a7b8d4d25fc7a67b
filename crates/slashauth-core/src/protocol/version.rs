// ============================================
// File: crates/slashauth-core/src/protocol/version.rs
// ============================================
//! # Protocol Versioning
//!
//! ## Version History
//! | Version | Description |
//! |---------|-------------|
//! | 0x01    | Initial handshake and envelope format |
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALWAYS increment version for handshake wire format changes
//!
//! ## Last Modified
//! v0.1.0 - Initial version definitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current protocol version.
pub const CURRENT_PROTOCOL_VERSION: u8 = 0x01;

/// Minimum supported protocol version.
pub const MIN_SUPPORTED_VERSION: u8 = 0x01;

/// Maximum supported protocol version.
pub const MAX_SUPPORTED_VERSION: u8 = 0x01;

/// Protocol version identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u8);

impl ProtocolVersion {
    /// Creates a version from its byte.
    #[must_use]
    pub const fn new(version: u8) -> Self {
        Self(version)
    }

    /// Returns the current protocol version.
    #[must_use]
    pub const fn current() -> Self {
        Self(CURRENT_PROTOCOL_VERSION)
    }

    /// Returns the raw version byte.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Checks if this version is within the supported range.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.0 >= MIN_SUPPORTED_VERSION && self.0 <= MAX_SUPPORTED_VERSION
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.0 >> 4, self.0 & 0x0F)
    }
}

impl From<u8> for ProtocolVersion {
    fn from(version: u8) -> Self {
        Self(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_support_check() {
        assert!(ProtocolVersion::current().is_supported());
        assert!(!ProtocolVersion::new(0).is_supported());
        assert!(!ProtocolVersion::new(0xFF).is_supported());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::new(0x01).to_string(), "v0.1");
        assert_eq!(ProtocolVersion::new(0x10).to_string(), "v1.0");
    }
}
