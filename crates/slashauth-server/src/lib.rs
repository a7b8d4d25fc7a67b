// ============================================
// File: crates/slashauth-server/src/lib.rs
// ============================================
//! # SlashAuth Server Library
//!
//! ## Creation Reason
//! Provides the server side of the SlashAuth challenge/response protocol:
//! token issuance, proof-of-possession checks, and the application
//! callbacks that decide authorization.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Connection handling and the listener lifecycle
//! - [`services`]: Business logic services
//!   - [`services::token_store`]: single-use tokens
//!   - [`services::responder`]: handshake responder and rotation
//!   - [`services::dispatcher`]: per-method request handling
//! - [`key_file`]: long-term identity on disk
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SlashAuth Server                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│ AuthServer  │────►│   Dispatcher    │    │
//! │  │  Manager    │     │ (per conn.) │     │                 │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! │         ┌───────────────────┘          ┌──────────┴──────┐      │
//! │         ▼                              ▼                 ▼      │
//! │  ┌─────────────┐              ┌─────────────┐   ┌─────────────┐ │
//! │  │  Responder  │              │ TokenStore  │   │AuthHandlers │ │
//! │  │    Slot     │              │             │   │ (app code)  │ │
//! │  └─────────────┘              └─────────────┘   └─────────────┘ │
//! │                                                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                             │
//! │        TcpTransport (network) / MemoryTransport (tests)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Client → Transport → [Decrypt] → Dispatcher → [Encrypt | Sign] → Client
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - The in-memory token backend does not survive restarts
//! - Graceful shutdown waits briefly for open connections
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod key_file;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::{ServerConfig, TransportKind};
pub use error::{Result, ServerError};
pub use server::{AuthServer, AuthServerBuilder, ConnectionState};
pub use services::{AuthHandlers, MemoryTokenStorage, TokenStorage, TokenStore};
