// ============================================
// File: crates/slashauth-core/src/protocol/url.rs
// ============================================
//! # Challenge URL
//!
//! Carries a token (and, in encrypted mode, how to reach the responder and
//! which static key to expect) from the server to the client out of band.
//!
//! ```text
//! <base>?token=<token>[&relay=<host:port>][&key=<responder key hex>]
//! ```
//!
//! Values are restricted to URL-safe characters instead of being
//! percent-encoded: tokens and keys are hex, relays are `host:port`.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Parsed challenge URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeUrl {
    /// Everything before the query string.
    pub base: String,
    /// Single-use token.
    pub token: String,
    /// Address of the responder, if the URL is meant for a socket client.
    pub relay: Option<String>,
    /// Responder static key (hex).
    pub server_key: Option<String>,
}

impl ChallengeUrl {
    /// Creates a URL with just a base and a token.
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            token: token.into(),
            relay: None,
            server_key: None,
        }
    }

    /// Sets the relay address.
    #[must_use]
    pub fn with_relay(mut self, relay: impl Into<String>) -> Self {
        self.relay = Some(relay.into());
        self
    }

    /// Sets the expected responder key.
    #[must_use]
    pub fn with_server_key(mut self, key: impl Into<String>) -> Self {
        self.server_key = Some(key.into());
        self
    }

    /// Renders the URL.
    #[must_use]
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Parses a URL.
    ///
    /// # Errors
    /// `InvalidUrl` when there is no query string, no `token`, or a
    /// parameter value contains characters outside the allowed set.
    pub fn parse(url: &str) -> Result<Self> {
        let (base, query) = url
            .split_once('?')
            .ok_or_else(|| CoreError::invalid_url("missing query string"))?;

        let mut token = None;
        let mut relay = None;
        let mut server_key = None;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| CoreError::invalid_url(format!("parameter without value: {pair}")))?;
            if !is_url_safe(value) {
                return Err(CoreError::invalid_url(format!("unsupported characters in '{name}'")));
            }
            match name {
                "token" => token = Some(value.to_string()),
                "relay" => relay = Some(value.to_string()),
                "key" => server_key = Some(value.to_string()),
                // Unknown parameters are ignored
                _ => {}
            }
        }

        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::invalid_url("missing token"))?;

        Ok(Self {
            base: base.to_string(),
            token,
            relay,
            server_key,
        })
    }
}

fn is_url_safe(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | ':' | '[' | ']'))
}

impl fmt::Display for ChallengeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?token={}", self.base, self.token)?;
        if let Some(relay) = &self.relay {
            write!(f, "&relay={relay}")?;
        }
        if let Some(key) = &self.server_key {
            write!(f, "&key={key}")?;
        }
        Ok(())
    }
}

impl FromStr for ChallengeUrl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minimal() {
        let url = ChallengeUrl::new("slashauth://example.com/auth", "abc123");
        assert_eq!(url.format(), "slashauth://example.com/auth?token=abc123");
    }

    #[test]
    fn test_format_and_parse_full() {
        let url = ChallengeUrl::new("slashauth://example.com/auth", "abc123")
            .with_relay("127.0.0.1:8787")
            .with_server_key("4bbeef");
        let text = url.format();
        assert_eq!(
            text,
            "slashauth://example.com/auth?token=abc123&relay=127.0.0.1:8787&key=4bbeef"
        );
        assert_eq!(ChallengeUrl::parse(&text).unwrap(), url);
    }

    #[test]
    fn test_parse_ignores_unknown_parameters() {
        let url: ChallengeUrl = "https://x.test/a?extra=1&token=ff".parse().unwrap();
        assert_eq!(url.token, "ff");
        assert_eq!(url.base, "https://x.test/a");
        assert!(url.relay.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(ChallengeUrl::parse("https://x.test/a").is_err());
        assert!(ChallengeUrl::parse("https://x.test/a?relay=h:1").is_err());
        assert!(ChallengeUrl::parse("https://x.test/a?token=").is_err());
        assert!(ChallengeUrl::parse("https://x.test/a?token").is_err());
        assert!(ChallengeUrl::parse("https://x.test/a?token=a b").is_err());
    }
}
