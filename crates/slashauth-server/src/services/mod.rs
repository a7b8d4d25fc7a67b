// ============================================
// File: crates/slashauth-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Business logic for the SlashAuth server, separated from transport and
//! connection concerns.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`token_store`]: single-use challenge tokens
//! - [`responder`]: current handshake responder, with rotation
//! - [`dispatcher`]: per-method request handling
//! - [`nonce_guard`]: freshness and replay check for `requestToken` nonces
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Service Layer                        │
//! ├─────────────────────────────────────────────────────────┤
//! │                                                         │
//! │  ┌─────────────────────────────────────┐                │
//! │  │            Dispatcher               │                │
//! │  │  - Verify proofs of possession      │                │
//! │  │  - Call AuthHandlers                │                │
//! │  │  - Sign responses (plain mode)      │                │
//! │  └──────┬───────────────┬──────────┬────┘                │
//! │         │               │          │                     │
//! │  ┌──────▼───────┐ ┌─────▼──────┐ ┌─▼─────────────┐       │
//! │  │  TokenStore  │ │ NonceGuard │ │ ResponderSlot │       │
//! │  │  - issue     │ │  - check   │ │  - current()  │       │
//! │  │  - consume   │ │            │ │  - rotate()   │       │
//! │  └──────────────┘ └────────────┘ └───────────────┘       │
//! │                                                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All services are Send + Sync and shared behind `Arc`
//! - Storage backends plug in through `TokenStorage`
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod dispatcher;
pub mod nonce_guard;
pub mod responder;
pub mod token_store;

// Re-export primary types
pub use dispatcher::{AuthHandlers, Dispatcher, Peer};
pub use nonce_guard::NonceGuard;
pub use responder::ResponderSlot;
pub use token_store::{MemoryTokenStorage, TokenStorage, TokenStore};
