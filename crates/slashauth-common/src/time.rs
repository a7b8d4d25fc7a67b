// ============================================
// File: crates/slashauth-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! The handshake carries the initiator's wall-clock time so the responder
//! can reject stale `ClientHello` messages.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp with bound and skew validation
//!
//! ## ⚠️ Important Note for Next Developer
//! - Skew is symmetric: timestamps too far in the future are rejected too
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Constants
// ============================================

/// Default clock skew tolerated by handshake validation (30 seconds).
pub const MAX_CLOCK_SKEW_SECS: u64 = 30;

/// Minimum valid Unix timestamp (year 2020).
pub const MIN_VALID_TIMESTAMP: i64 = 1_577_836_800;

/// Maximum valid Unix timestamp (year 2100).
pub const MAX_VALID_TIMESTAMP: i64 = 4_102_444_800;

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in seconds.
///
/// # Example
/// ```
/// use slashauth_common::time::Timestamp;
///
/// let now = Timestamp::now();
/// assert!(now.is_valid());
/// assert!(now.is_recent(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp for the current time.
    ///
    /// A clock set before the Unix epoch yields `0`, which then fails
    /// [`Timestamp::validate`] rather than panicking here.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(secs)
    }

    /// Returns the Unix timestamp in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Returns the timestamp as little-endian bytes.
    #[must_use]
    pub const fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Creates a timestamp from little-endian bytes.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_le_bytes(bytes))
    }

    /// Checks if the timestamp is within valid bounds.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 >= MIN_VALID_TIMESTAMP && self.0 <= MAX_VALID_TIMESTAMP
    }

    /// Returns `true` if `|timestamp - now| <= max_skew_secs`.
    #[must_use]
    pub fn is_recent(&self, max_skew_secs: u64) -> bool {
        let diff = self.0.saturating_sub(Self::now().0).unsigned_abs();
        diff <= max_skew_secs
    }

    /// Validates the timestamp against bounds and the given skew.
    ///
    /// # Errors
    /// - [`TimestampError::OutOfBounds`] outside 2020..2100
    /// - [`TimestampError::ClockSkew`] when farther than `max_skew_secs` from now
    pub fn validate(&self, max_skew_secs: u64) -> Result<(), TimestampError> {
        if !self.is_valid() {
            return Err(TimestampError::OutOfBounds {
                value: self.0,
                min: MIN_VALID_TIMESTAMP,
                max: MAX_VALID_TIMESTAMP,
            });
        }

        if !self.is_recent(max_skew_secs) {
            return Err(TimestampError::ClockSkew {
                timestamp: self.0,
                now: Self::now().0,
                max_skew: max_skew_secs,
            });
        }

        Ok(())
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// TimestampError
// ============================================

/// Errors that can occur during timestamp validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    /// Timestamp is outside valid bounds.
    #[error("Timestamp {value} out of bounds [{min}, {max}]")]
    OutOfBounds {
        /// The invalid timestamp value
        value: i64,
        /// Minimum valid value
        min: i64,
        /// Maximum valid value
        max: i64,
    },

    /// Timestamp differs too much from current time.
    #[error("Clock skew detected: timestamp={timestamp}, now={now}, max_skew={max_skew}s")]
    ClockSkew {
        /// The timestamp value
        timestamp: i64,
        /// Current time
        now: i64,
        /// Maximum allowed skew
        max_skew: u64,
    },
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now() {
        let ts = Timestamp::now();
        assert!(ts.is_valid());
        assert!(ts.is_recent(1));
    }

    #[test]
    fn test_timestamp_validation() {
        assert!(Timestamp::now().validate(MAX_CLOCK_SKEW_SECS).is_ok());

        let old = Timestamp::from_secs(Timestamp::now().as_secs() - 60);
        assert!(matches!(
            old.validate(MAX_CLOCK_SKEW_SECS),
            Err(TimestampError::ClockSkew { .. })
        ));
        // A wider window accepts the same value
        assert!(old.validate(120).is_ok());

        let future = Timestamp::from_secs(Timestamp::now().as_secs() + 60);
        assert!(future.validate(MAX_CLOCK_SKEW_SECS).is_err());

        assert!(matches!(
            Timestamp::from_secs(0).validate(MAX_CLOCK_SKEW_SECS),
            Err(TimestampError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_timestamp_le_bytes() {
        let ts = Timestamp::from_secs(1_700_000_000);
        assert_eq!(ts.to_le_bytes(), 1_700_000_000i64.to_le_bytes());
        assert_eq!(Timestamp::from_le_bytes(ts.to_le_bytes()), ts);
    }
}
