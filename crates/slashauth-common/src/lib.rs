// ============================================
// File: crates/slashauth-common/src/lib.rs
// ============================================
//! # SlashAuth Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Holds the handful of types every SlashAuth crate agrees on, so the
//! protocol, transport and server layers never redefine them.
//!
//! ## Main Functionality
//! - [`types`]: Session identifiers and log-safe key abbreviation
//! - [`time`]: Unix timestamps with freshness checks for handshakes
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │   slashauth-server              slashauth-client      │
//! │          │                             │              │
//! │          ├─────────────┬───────────────┤              │
//! │          ▼             ▼               ▼              │
//! │   slashauth-core   slashauth-transport                │
//! │          │             │                              │
//! │          └──────┬──────┘                              │
//! │                 ▼                                     │
//! │         slashauth-common  ◄── You are here            │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Leaf crate: it must not depend on any other SlashAuth crate
//! - Security-sensitive types must implement Zeroize
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::Timestamp;
pub use types::{abbreviate, SessionId};
