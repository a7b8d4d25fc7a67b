// ============================================
// File: crates/slashauth-core/src/protocol/mode.rs
// ============================================
//! # Channel Mode
//!
//! Whether a connection runs the three operations over plain signed
//! envelopes or inside a [`SecureChannel`](crate::crypto::SecureChannel).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How envelopes travel on a connection.
///
/// | Mode | Handshake | Requests | Responses |
/// |------|-----------|----------|-----------|
/// | `Plain` | none | signed | signed |
/// | `Encrypted` | `ClientHello`/`ServerHello` | channel-encrypted | channel-encrypted |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Signed envelopes, no channel.
    Plain,
    /// Handshake first, then encrypted frames.
    #[default]
    Encrypted,
}

impl ChannelMode {
    /// Returns `true` for [`ChannelMode::Encrypted`].
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        matches!(self, Self::Encrypted)
    }

    /// Config/CLI name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Encrypted => "encrypted",
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "encrypted" => Ok(Self::Encrypted),
            other => Err(CoreError::malformed(format!("unknown channel mode '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!("plain".parse::<ChannelMode>().unwrap(), ChannelMode::Plain);
        assert_eq!(ChannelMode::default(), ChannelMode::Encrypted);
        assert!(ChannelMode::Encrypted.is_encrypted());
        assert!("tls".parse::<ChannelMode>().is_err());
        assert_eq!(serde_json::to_string(&ChannelMode::Plain).unwrap(), "\"plain\"");
    }
}
