// ============================================
// File: crates/slashauth-server/src/services/dispatcher.rs
// ============================================
//! # Request Dispatcher
//!
//! ## Creation Reason
//! Turns one decoded [`RequestEnvelope`] into one [`ResponseEnvelope`]:
//! method parsing, proof-of-possession checks, token consumption, the
//! application callback, and response signing.
//!
//! ## Main Functionality
//! - `AuthHandlers`: application callbacks (`authz`, `magiclink`)
//! - `Peer`: what the connection has already proven about the caller
//! - `Dispatcher`: exhaustive per-method handling
//!
//! ## Per-Method Rules
//! ```text
//! ┌──────────────┬─────────────────────────┬──────────────────────────────┐
//! │ Method       │ Plain peer              │ Channel peer                 │
//! ├──────────────┼─────────────────────────┼──────────────────────────────┤
//! │ requestToken │ verify sig(nonce, pk)   │ trust channel                │
//! │              │ fresh, unseen nonce     │                              │
//! │              │ issue token             │ issue token (+rotate)        │
//! │ authz        │ verify sig(token, pk)   │ trust channel                │
//! │              │ handlers.authz          │ handlers.authz               │
//! │ magiclink    │ verify sig(token, pk)   │ verify sig(token, pk)        │
//! │              │ consume, then callback  │ consume, then callback       │
//! ├──────────────┼─────────────────────────┼──────────────────────────────┤
//! │ response     │ signed                  │ encrypted by the connection  │
//! └──────────────┴─────────────────────────┴──────────────────────────────┘
//! ```
//! A channel peer's envelope `publicKey` must equal the channel's
//! authenticated remote key.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `magiclink` consumes the token BEFORE calling the application, so a
//!   failing callback cannot be retried with the same token
//! - Signed data uses the lowercase hex of the parsed public key
//! - Every failure here becomes `{error:{message}}`; nothing in this module
//!   closes the connection
//!
//! ## Last Modified
//! v0.1.0 - Initial dispatcher
//! v0.1.1 - requestToken nonce freshness; empty magiclink tokens are consumed

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use slashauth_common::abbreviate;
use slashauth_common::time::MAX_CLOCK_SKEW_SECS;
use slashauth_core::crypto::{
    sign_canonical, verify_canonical, CryptoProvider, IdentityKeyPair, IdentityPublicKey,
};
use slashauth_core::error::CoreError;
use slashauth_core::protocol::{canonical_json, Method, RequestEnvelope, ResponseEnvelope};

use crate::error::{Result, ServerError};
use crate::services::nonce_guard::NonceGuard;
use crate::services::responder::ResponderSlot;
use crate::services::token_store::TokenStore;

// ============================================
// AuthHandlers
// ============================================

/// Application callbacks invoked by the dispatcher.
///
/// An `Err` is returned to the caller as `{error:{message}}` with the
/// error's display text.
#[async_trait]
pub trait AuthHandlers: Send + Sync {
    /// Decides whether `public_key` is authorized for `token`.
    async fn authz(&self, public_key: &str, token: &str) -> anyhow::Result<Value>;

    /// Produces the side-channel credential for `public_key`.
    async fn magiclink(&self, public_key: &str) -> anyhow::Result<Value>;
}

// ============================================
// Peer
// ============================================

/// What the connection has established about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// Nothing; every request must carry its own proof.
    Plain,
    /// Handshake completed with this static key.
    Channel(IdentityPublicKey),
}

impl Peer {
    /// Returns `true` for a plain peer.
    #[must_use]
    pub const fn is_plain(&self) -> bool {
        matches!(self, Self::Plain)
    }
}

// ============================================
// Dispatcher
// ============================================

/// Executes requests against the token store and the application.
pub struct Dispatcher {
    signing_identity: IdentityKeyPair,
    provider: Arc<dyn CryptoProvider>,
    tokens: Arc<TokenStore>,
    handlers: Arc<dyn AuthHandlers>,
    responder: Arc<ResponderSlot>,
    nonces: NonceGuard,
    rotate_responder: bool,
}

impl Dispatcher {
    /// Creates a dispatcher. Responses to plain peers are signed with
    /// `signing_identity`.
    pub fn new(
        signing_identity: IdentityKeyPair,
        provider: Arc<dyn CryptoProvider>,
        tokens: Arc<TokenStore>,
        handlers: Arc<dyn AuthHandlers>,
        responder: Arc<ResponderSlot>,
    ) -> Self {
        Self {
            signing_identity,
            provider,
            tokens,
            handlers,
            responder,
            nonces: NonceGuard::new(MAX_CLOCK_SKEW_SECS),
            rotate_responder: false,
        }
    }

    /// Sets how far a `requestToken` nonce's issue time may be from now.
    #[must_use]
    pub fn with_nonce_window(mut self, window_secs: u64) -> Self {
        self.nonces = NonceGuard::new(window_secs);
        self
    }

    /// Rotates the responder identity after each `requestToken` from a
    /// channel peer.
    #[must_use]
    pub fn with_rotation(mut self, enabled: bool) -> Self {
        self.rotate_responder = enabled;
        self
    }

    /// Public key that signs plain-mode responses.
    #[must_use]
    pub fn signing_public_key(&self) -> IdentityPublicKey {
        self.signing_identity.public_key()
    }

    /// Handles one request. Never fails: errors become error envelopes.
    pub async fn dispatch(&self, request: &RequestEnvelope, peer: &Peer) -> ResponseEnvelope {
        match self.handle(request, peer).await {
            Ok(result) => {
                info!(
                    method = %request.method,
                    public_key = abbreviate(&request.public_key),
                    "Request served"
                );
                if peer.is_plain() {
                    self.signed_response(request, result)
                } else {
                    ResponseEnvelope::ok(result)
                }
            }
            Err(e) => {
                if e.is_suspicious() {
                    warn!(
                        method = %request.method,
                        public_key = abbreviate(&request.public_key),
                        error = %e,
                        "Request rejected"
                    );
                } else {
                    debug!(method = %request.method, error = %e, "Request failed");
                }
                ResponseEnvelope::error(e.wire_message())
            }
        }
    }

    async fn handle(&self, request: &RequestEnvelope, peer: &Peer) -> Result<Value> {
        let method = request.method()?;
        let public_key = self.authenticate_caller(request, peer)?;
        let owner = public_key.to_hex();

        match method {
            Method::RequestToken => {
                if peer.is_plain() {
                    let nonce = request.nonce.as_deref().ok_or(CoreError::InvalidSignature)?;
                    self.verify(request, nonce, &owner, &public_key)?;
                    self.nonces.check(&owner, nonce)?;
                }

                let token = self.tokens.issue(&owner).await?;
                let mut result = json!({ "token": token });
                if self.rotate_responder && !peer.is_plain() {
                    let next = self.responder.rotate();
                    result["newResponderKey"] = Value::String(next.to_hex());
                }
                Ok(result)
            }

            Method::Authz => {
                let token = Self::presented_token(request)?;
                if peer.is_plain() {
                    self.verify(request, token, &owner, &public_key)?;
                }

                self.handlers
                    .authz(&owner, token)
                    .await
                    .map_err(|e| ServerError::application(e.to_string()))
            }

            Method::Magiclink => {
                // An empty token still reaches `consume` so the entry is spent
                let token = request.token().unwrap_or_default();
                self.verify(request, token, &owner, &public_key)?;

                self.tokens.consume(&owner, token).await?;

                self.handlers
                    .magiclink(&owner)
                    .await
                    .map_err(|e| ServerError::application(e.to_string()))
            }
        }
    }

    /// Parses the envelope key and, for channel peers, binds it to the
    /// handshake identity.
    fn authenticate_caller(
        &self,
        request: &RequestEnvelope,
        peer: &Peer,
    ) -> Result<IdentityPublicKey> {
        let public_key = IdentityPublicKey::from_hex(&request.public_key)
            .map_err(|_| CoreError::InvalidSignature)?;

        if let Peer::Channel(remote) = peer {
            if *remote != public_key {
                warn!(
                    claimed = abbreviate(&request.public_key),
                    channel = %remote,
                    "Envelope key differs from channel identity"
                );
                return Err(CoreError::InvalidSignature.into());
            }
        }

        Ok(public_key)
    }

    fn presented_token(request: &RequestEnvelope) -> Result<&str> {
        request
            .token()
            .filter(|t| !t.is_empty())
            .ok_or(ServerError::InvalidToken)
    }

    fn verify(
        &self,
        request: &RequestEnvelope,
        nonce: &str,
        data: &str,
        public_key: &IdentityPublicKey,
    ) -> Result<()> {
        let signature = request
            .signature
            .as_deref()
            .ok_or(CoreError::InvalidSignature)?;
        verify_canonical(self.provider.as_ref(), signature, nonce, data, public_key)?;
        Ok(())
    }

    fn signed_response(&self, request: &RequestEnvelope, result: Value) -> ResponseEnvelope {
        match canonical_json(&result) {
            Ok(data) => {
                let signature = sign_canonical(
                    self.provider.as_ref(),
                    &self.signing_identity,
                    request.binding_nonce(),
                    &data,
                );
                ResponseEnvelope::ok(result).with_signature(signature)
            }
            Err(e) => ResponseEnvelope::error(ServerError::from(e).wire_message()),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("signing_key", &self.signing_identity.public_key())
            .field("rotate_responder", &self.rotate_responder)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use slashauth_common::time::Timestamp;
    use slashauth_core::crypto::{canonicalize, timestamped_nonce, DefaultCryptoProvider};

    #[derive(Default)]
    struct CountingHandlers {
        authz_calls: AtomicUsize,
        magiclink_calls: AtomicUsize,
        fail_magiclink: bool,
    }

    #[async_trait]
    impl AuthHandlers for CountingHandlers {
        async fn authz(&self, _public_key: &str, token: &str) -> anyhow::Result<Value> {
            self.authz_calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "status": "ok", "token": token }))
        }

        async fn magiclink(&self, public_key: &str) -> anyhow::Result<Value> {
            self.magiclink_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_magiclink {
                anyhow::bail!("mailer unavailable");
            }
            Ok(json!({ "url": format!("https://example.com/login/{public_key}") }))
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        handlers: Arc<CountingHandlers>,
        tokens: Arc<TokenStore>,
        server: IdentityKeyPair,
        client: IdentityKeyPair,
    }

    fn fixture(handlers: CountingHandlers) -> Fixture {
        let server = IdentityKeyPair::generate();
        let handlers = Arc::new(handlers);
        let tokens = Arc::new(TokenStore::in_memory());
        let dispatcher = Dispatcher::new(
            server.clone(),
            Arc::new(DefaultCryptoProvider),
            Arc::clone(&tokens),
            Arc::clone(&handlers) as Arc<dyn AuthHandlers>,
            Arc::new(ResponderSlot::new(server.clone(), 30)),
        );
        Fixture {
            dispatcher,
            handlers,
            tokens,
            server,
            client: IdentityKeyPair::generate(),
        }
    }

    fn signed(method: Method, client: &IdentityKeyPair, nonce: &str) -> RequestEnvelope {
        let pk = client.public_key_hex();
        let params = if method == Method::RequestToken {
            json!({})
        } else {
            json!({ "token": nonce })
        };
        let signature = hex::encode(client.sign(&canonicalize(nonce, &pk)));
        RequestEnvelope::new(method, params, pk).signed(nonce, signature)
    }

    fn error_message(response: &ResponseEnvelope) -> &str {
        response.error.as_ref().map_or("", |e| e.message.as_str())
    }

    #[tokio::test]
    async fn test_request_token_plain() {
        let f = fixture(CountingHandlers::default());
        let nonce = timestamped_nonce(&DefaultCryptoProvider);
        let request = signed(Method::RequestToken, &f.client, &nonce);

        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        let result = response.result.clone().unwrap();
        let token = result["token"].as_str().unwrap();

        assert_eq!(
            f.tokens.peek(&f.client.public_key_hex()).await.unwrap().as_deref(),
            Some(token)
        );
        assert!(result.get("newResponderKey").is_none());

        // Response is bound to the request nonce
        let data = canonical_json(&result).unwrap();
        let signature = hex::decode(response.signature.unwrap()).unwrap();
        let signature: [u8; 64] = signature.try_into().unwrap();
        f.server
            .public_key()
            .verify(&canonicalize(&nonce, &data), &signature)
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_token_bad_self_signature() {
        let f = fixture(CountingHandlers::default());
        let nonce = timestamped_nonce(&DefaultCryptoProvider);
        let mut request = signed(Method::RequestToken, &f.client, &nonce);
        request.nonce = Some(timestamped_nonce(&DefaultCryptoProvider));

        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Invalid signature");
        assert!(f.tokens.peek(&f.client.public_key_hex()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_request_token_replay_rejected() {
        let f = fixture(CountingHandlers::default());
        let owner = f.client.public_key_hex();
        let nonce = timestamped_nonce(&DefaultCryptoProvider);
        let request = signed(Method::RequestToken, &f.client, &nonce);

        let first = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        let issued = first.result.unwrap()["token"].as_str().unwrap().to_string();

        let replay = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&replay), "Invalid nonce");
        assert!(replay.signature.is_none());
        assert_eq!(f.tokens.peek(&owner).await.unwrap(), Some(issued));
    }

    #[tokio::test]
    async fn test_request_token_stale_or_untimed_nonce_rejected() {
        let f = fixture(CountingHandlers::default());
        let owner = f.client.public_key_hex();
        let stale = format!("{}.{}", Timestamp::now().as_secs() - 3600, "ab".repeat(32));

        for nonce in [stale.as_str(), "client-nonce"] {
            let request = signed(Method::RequestToken, &f.client, nonce);
            let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
            assert_eq!(error_message(&response), "Invalid nonce");
        }
        assert!(f.tokens.peek(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_magiclink_consumes_token() {
        let f = fixture(CountingHandlers::default());
        let owner = f.client.public_key_hex();
        f.tokens.insert(&owner, "abc123").await.unwrap();

        let request = signed(Method::Magiclink, &f.client, "abc123");
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert!(!response.is_error());
        assert!(response.signature.is_some());
        assert!(f.tokens.peek(&owner).await.unwrap().is_none());

        let replay = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&replay), "Invalid token");
        assert_eq!(f.handlers.magiclink_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_callback_still_consumes() {
        let f = fixture(CountingHandlers {
            fail_magiclink: true,
            ..Default::default()
        });
        let owner = f.client.public_key_hex();
        f.tokens.insert(&owner, "t0k3n").await.unwrap();

        let request = signed(Method::Magiclink, &f.client, "t0k3n");
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "mailer unavailable");
        assert!(f.tokens.peek(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_authz_forged_signature_skips_callback() {
        let f = fixture(CountingHandlers::default());
        let forger = IdentityKeyPair::generate();
        let mut request = signed(Method::Authz, &forger, "deadbeef");
        request.public_key = f.client.public_key_hex();

        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Invalid signature");
        assert_eq!(f.handlers.authz_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authz_channel_peer_trusts_channel() {
        let f = fixture(CountingHandlers::default());
        let pk = f.client.public_key_hex();
        let request = RequestEnvelope::new(Method::Authz, json!({ "token": "deadbeef" }), pk);

        let response = f
            .dispatcher
            .dispatch(&request, &Peer::Channel(f.client.public_key()))
            .await;
        assert_eq!(response.result.unwrap()["token"], "deadbeef");
        assert!(response.signature.is_none());
    }

    #[tokio::test]
    async fn test_channel_peer_key_binding() {
        let f = fixture(CountingHandlers::default());
        let other = IdentityKeyPair::generate();
        let request = RequestEnvelope::new(
            Method::Authz,
            json!({ "token": "deadbeef" }),
            other.public_key_hex(),
        );

        let response = f
            .dispatcher
            .dispatch(&request, &Peer::Channel(f.client.public_key()))
            .await;
        assert_eq!(error_message(&response), "Invalid signature");
        assert_eq!(f.handlers.authz_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rotation_on_channel_request_token() {
        let f = fixture(CountingHandlers::default());
        let responder = Arc::clone(&f.dispatcher.responder);
        let dispatcher = f.dispatcher.with_rotation(true);
        let before = responder.public_key();

        let request =
            RequestEnvelope::new(Method::RequestToken, json!({}), f.client.public_key_hex());
        let response = dispatcher
            .dispatch(&request, &Peer::Channel(f.client.public_key()))
            .await;

        let result = response.result.unwrap();
        let new_key = result["newResponderKey"].as_str().unwrap();
        assert_ne!(new_key, before.to_hex());
        assert_eq!(new_key, responder.public_key().to_hex());
    }

    #[tokio::test]
    async fn test_unknown_method_and_missing_token() {
        let f = fixture(CountingHandlers::default());
        let mut request = signed(Method::Authz, &f.client, "tok");
        request.method = "deleteEverything".into();
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Unknown method: deleteEverything");

        let request = RequestEnvelope::new(Method::Authz, json!({}), f.client.public_key_hex());
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Invalid token");
    }

    #[tokio::test]
    async fn test_magiclink_empty_token_spends_outstanding_token() {
        let f = fixture(CountingHandlers::default());
        let owner = f.client.public_key_hex();
        f.tokens.insert(&owner, "abc123").await.unwrap();

        let request = signed(Method::Magiclink, &f.client, "");
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Invalid token");
        assert!(f.tokens.peek(&owner).await.unwrap().is_none());
        assert_eq!(f.handlers.magiclink_calls.load(Ordering::SeqCst), 0);

        // The real token is gone as well
        let request = signed(Method::Magiclink, &f.client, "abc123");
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Invalid token");
    }

    #[tokio::test]
    async fn test_magiclink_missing_token_unsigned_keeps_entry() {
        let f = fixture(CountingHandlers::default());
        let owner = f.client.public_key_hex();
        f.tokens.insert(&owner, "abc123").await.unwrap();

        let request = RequestEnvelope::new(Method::Magiclink, json!({}), owner.clone());
        let response = f.dispatcher.dispatch(&request, &Peer::Plain).await;
        assert_eq!(error_message(&response), "Invalid signature");
        assert_eq!(f.tokens.peek(&owner).await.unwrap().as_deref(), Some("abc123"));
    }
}
