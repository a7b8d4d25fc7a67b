// ============================================
// File: crates/slashauth-client/src/lib.rs
// ============================================
//! # SlashAuth Client Library
//!
//! ## Creation Reason
//! Client half of the SlashAuth challenge/response protocol, for
//! applications that must prove possession of an Ed25519 key to a
//! SlashAuth server.
//!
//! ## Main Functionality
//! - [`client`]: `AuthClient`, its builder, and the client state machine
//! - [`error`]: Client-specific error types
//!
//! ## Quick Start
//! ```ignore
//! let mut client = AuthClient::builder()
//!     .key_pair(identity)
//!     .server_key(server_key)
//!     .connect_tcp("127.0.0.1:8787")
//!     .await?;
//!
//! let grant = client.authz_url(&challenge_url).await?;
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One `AuthClient` is one logical connection; reconnect after `Failed`
//! - The pinned server key must match the server's mode (responder key
//!   when encrypted, signing key when plain)
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;

// Re-export primary types
pub use client::{AuthClient, AuthClientBuilder, ClientOptions, ClientState};
pub use error::{ClientError, Result};
