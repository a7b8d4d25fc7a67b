// ============================================
// File: crates/slashauth-transport/src/lib.rs
// ============================================
//! # SlashAuth Transport - Frame I/O Layer
//!
//! ## Creation Reason
//! The client and server protocol engines exchange whole frames and do not
//! care how they travel. This crate provides that abstraction plus the
//! carriers SlashAuth ships with.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Transport` and `TransportListener` traits
//! - [`memory`]: In-process connected pair (tests, embedding)
//! - [`tcp`]: Length-prefixed TCP frames and a listener
//! - [`http_tunnel`]: The same frames behind an HTTP `CONNECT` upgrade
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │      slashauth-server        slashauth-client       │
//! │             │                       │               │
//! │             └──────────┬────────────┘               │
//! │                        ▼                            │
//! │               slashauth-transport                   │
//! │               You are here ◄──                      │
//! │                        │                            │
//! │                        ▼                            │
//! │               slashauth-common                      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Transports never see plaintext secrets in encrypted mode; the channel
//!   sits above this layer
//! - Always program against the trait for testability
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod http_tunnel;
pub mod memory;
pub mod tcp;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use http_tunnel::{HttpTunnelListener, HttpTunnelTransport, TunnelTarget};
pub use memory::MemoryTransport;
pub use tcp::{TcpTransport, TcpTransportListener, MAX_FRAME_SIZE};
pub use traits::{Transport, TransportListener};
