// ============================================
// File: crates/slashauth-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the SlashAuth server, loaded
//! from TOML.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Defaults suitable for a local deployment
//!
//! ## Configuration Sections
//! - `network`: listen address, carrier (tcp / http_tunnel), public URL,
//!   advertised relay
//! - `channel`: plain/encrypted mode, responder rotation, handshake skew
//! - `server_key`: Key file path
//! - `limits`: Connection and idle limits
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:8787"
//! transport = "tcp"          # or "http_tunnel"
//! public_url = "slashauth://auth.example.com/auth"
//! relay_addr = "auth.example.com:8787"
//!
//! [channel]
//! mode = "encrypted"
//! rotate_responder_key = true
//!
//! [limits]
//! max_connections = 1000
//! idle_timeout_secs = 60
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - Validate config before server startup
//! - With `transport = "http_tunnel"` the path of `public_url` is the only
//!   path the tunnel accepts, so `public_url` must be `http://`
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation
//! v0.1.1 - HTTP tunnel carrier

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use slashauth_common::time::MAX_CLOCK_SKEW_SECS;
use slashauth_core::protocol::ChannelMode;
use slashauth_transport::TunnelTarget;

use crate::error::{Result, ServerError};

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Channel configuration.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Server key configuration.
    #[serde(default)]
    pub server_key: ServerKeyConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed, or fails validation.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Parse or validation failure.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        if self.network.transport == TransportKind::HttpTunnel {
            self.tunnel_path()?;
        }
        self.channel.validate()?;
        self.limits.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Relay address advertised in challenge URLs.
    #[must_use]
    pub fn advertised_relay(&self) -> String {
        self.network
            .relay_addr
            .clone()
            .unwrap_or_else(|| self.network.listen_addr.to_string())
    }

    /// Path accepted by the HTTP tunnel: the path of `public_url`.
    ///
    /// # Errors
    /// `ConfigInvalid` when `public_url` is not an `http://` URL.
    pub fn tunnel_path(&self) -> Result<String> {
        TunnelTarget::from_url(&self.network.public_url)
            .map(|target| target.path)
            .map_err(|_| {
                ServerError::config_invalid(
                    "network.public_url",
                    "must be an http:// URL when transport = \"http_tunnel\"",
                )
            })
    }

    /// Idle timeout as a `Duration`.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.idle_timeout_secs)
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Carrier for inbound connections.
    #[serde(default)]
    pub transport: TransportKind,

    /// Base of the challenge URLs handed to users.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// `host:port` clients should dial; defaults to `listen_addr`.
    #[serde(default)]
    pub relay_addr: Option<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_public_url() -> String {
    "slashauth://127.0.0.1:8787/auth".to_string()
}

/// How connections reach the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Length-prefixed frames straight over TCP.
    #[default]
    Tcp,
    /// The same frames after an HTTP `CONNECT` to the public URL's path.
    HttpTunnel,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::HttpTunnel => write!(f, "http_tunnel"),
        }
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.public_url.is_empty() {
            return Err(ServerError::config_invalid(
                "network.public_url",
                "cannot be empty",
            ));
        }

        if self.public_url.contains('?') {
            return Err(ServerError::config_invalid(
                "network.public_url",
                "must not contain a query string",
            ));
        }

        if let Some(relay) = &self.relay_addr {
            if relay.is_empty() || relay.contains(['?', '&', ' ']) {
                return Err(ServerError::config_invalid(
                    "network.relay_addr",
                    "must be host:port",
                ));
            }
        }

        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            transport: TransportKind::default(),
            public_url: default_public_url(),
            relay_addr: None,
        }
    }
}

// ============================================
// ChannelConfig
// ============================================

/// Channel configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Plain signed envelopes or encrypted channel.
    #[serde(default)]
    pub mode: ChannelMode,

    /// Replace the responder identity after every `requestToken`.
    #[serde(default)]
    pub rotate_responder_key: bool,

    /// Accepted ClientHello timestamp skew.
    #[serde(default = "default_timestamp_skew")]
    pub max_timestamp_skew_secs: u64,
}

fn default_timestamp_skew() -> u64 {
    MAX_CLOCK_SKEW_SECS
}

impl ChannelConfig {
    fn validate(&self) -> Result<()> {
        if self.max_timestamp_skew_secs == 0 {
            return Err(ServerError::config_invalid(
                "channel.max_timestamp_skew_secs",
                "must be greater than 0",
            ));
        }

        if self.rotate_responder_key && !self.mode.is_encrypted() {
            return Err(ServerError::config_invalid(
                "channel.rotate_responder_key",
                "requires mode = \"encrypted\"",
            ));
        }

        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::default(),
            rotate_responder_key: false,
            max_timestamp_skew_secs: default_timestamp_skew(),
        }
    }
}

// ============================================
// ServerKeyConfig
// ============================================

/// Server key configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerKeyConfig {
    /// Path to key file.
    #[serde(default = "default_key_file")]
    pub key_file: String,
}

fn default_key_file() -> String {
    "/etc/slashauth/server_key.json".to_string()
}

impl Default for ServerKeyConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Seconds a connection may sit idle between requests.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_idle_timeout() -> u64 {
    60
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_connections",
                "must be greater than 0",
            ));
        }

        if self.idle_timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "limits.idle_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
