// ============================================
// File: crates/slashauth-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: Binary handshake messages
//! - [`envelope`]: JSON request/response envelopes and the method set
//! - [`codec`]: Serialization for both
//! - [`version`]: Protocol versioning
//! - [`url`]: Challenge URL format/parse
//! - [`mode`]: Plain vs encrypted connections
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Handshake Phase (encrypted mode only)            │
//! │  Client ──────── ClientHello (138 bytes) ──────────► Server │
//! │  Client ◄─────── ServerHello (146 bytes) ────────── Server │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Request Phase                            │
//! │  Client ──── RequestEnvelope (or {encrypted}) ─────► Server │
//! │  Client ◄─── ResponseEnvelope (or {encrypted}) ──── Server │
//! │                 (repeatable per connection)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod envelope;
pub mod messages;
pub mod mode;
pub mod url;
pub mod version;

pub use codec::{Codec, ProtocolCodec};
pub use envelope::{
    canonical_json, AuthzGrant, AuthzStatus, EncryptedEnvelope, ErrorBody, MagicLink, Method,
    RequestEnvelope, ResponseEnvelope,
};
pub use messages::{ClientHello, MessageType, ServerHello};
pub use mode::ChannelMode;
pub use url::ChallengeUrl;
pub use version::{ProtocolVersion, CURRENT_PROTOCOL_VERSION};
