// ============================================
// File: crates/slashauth-server/src/services/token_store.rs
// ============================================
//! # Token Store
//!
//! ## Creation Reason
//! Tracks the one outstanding challenge token per public key and enforces
//! that a token is checked at most once.
//!
//! ## Main Functionality
//! - `TokenStorage`: pluggable key → value backend (`get`/`set`/`delete`,
//!   plus atomic `take`)
//! - `MemoryTokenStorage`: DashMap backend for single-instance deployments
//! - `TokenStore`: `issue` / `consume` on top of any backend
//!
//! ## Token Lifecycle
//! ```text
//!            issue(k)                 consume(k, t)
//! ┌────────┐ ───────► ┌─────────────┐ ────────────► ┌────────┐
//! │ (none) │          │ Outstanding │               │ (none) │
//! └────────┘ ◄─┐      └──────┬──────┘               └────────┘
//!              │             │ issue(k) again
//!              │             ▼
//!              │      ┌─────────────┐
//!              └───── │ Overwritten │  old token is simply gone
//!                     └─────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `consume` deletes the entry on EVERY call, including mismatches
//! - Multi-instance backends must implement `take` atomically; two racing
//!   `consume` calls must produce exactly one success
//!
//! ## Last Modified
//! v0.1.0 - Initial token store

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use slashauth_common::abbreviate;
use slashauth_core::crypto::{CryptoProvider, DefaultCryptoProvider};

use crate::error::{Result, ServerError};

// ============================================
// TokenStorage
// ============================================

/// Backing store for outstanding tokens, keyed by public key hex.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Returns the value stored for `key`.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` for `key`, replacing any previous value.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removes `key`.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically removes `key` and returns what it held.
    ///
    /// The default composes `get` and `delete`, which is only atomic for
    /// backends with a single writer.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    async fn take(&self, key: &str) -> Result<Option<String>> {
        let value = self.get(key).await?;
        self.delete(key).await?;
        Ok(value)
    }
}

// ============================================
// MemoryTokenStorage
// ============================================

/// In-process backend on a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    entries: DashMap<String, String>,
}

impl MemoryTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.remove(key).map(|(_, v)| v))
    }
}

// ============================================
// TokenStore
// ============================================

/// Issues and consumes single-use tokens.
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    provider: Arc<dyn CryptoProvider>,
}

impl TokenStore {
    /// Creates a store over `storage`, drawing nonces from `provider`.
    pub fn new(storage: Arc<dyn TokenStorage>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self { storage, provider }
    }

    /// In-memory store with the default crypto provider.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTokenStorage::new()),
            Arc::new(DefaultCryptoProvider),
        )
    }

    /// Generates a fresh token for `owner`, replacing any outstanding one.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    pub async fn issue(&self, owner: &str) -> Result<String> {
        let token = self.provider.create_nonce();
        self.storage.set(owner, token.clone()).await?;
        debug!(owner = abbreviate(owner), "Token issued");
        Ok(token)
    }

    /// Stores a caller-chosen token for `owner`, replacing any outstanding
    /// one. Used when tokens are minted elsewhere (e.g. embedded in a URL
    /// handed out by another service).
    ///
    /// # Errors
    /// `Storage` on backend failure.
    pub async fn insert(&self, owner: &str, token: impl Into<String>) -> Result<()> {
        self.storage.set(owner, token.into()).await
    }

    /// Checks `presented` against the outstanding token for `owner` and
    /// deletes the entry regardless of the outcome.
    ///
    /// # Errors
    /// - `InvalidToken`: nothing outstanding, empty or mismatched token
    /// - `Storage`: backend failure
    pub async fn consume(&self, owner: &str, presented: &str) -> Result<()> {
        let stored = self.storage.take(owner).await?;

        let Some(stored) = stored else {
            warn!(owner = abbreviate(owner), "No outstanding token");
            return Err(ServerError::InvalidToken);
        };

        if presented.is_empty() || !bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
            warn!(owner = abbreviate(owner), "Token mismatch");
            return Err(ServerError::InvalidToken);
        }

        debug!(owner = abbreviate(owner), "Token consumed");
        Ok(())
    }

    /// Returns the outstanding token without consuming it.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    pub async fn peek(&self, owner: &str) -> Result<Option<String>> {
        self.storage.get(owner).await
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
