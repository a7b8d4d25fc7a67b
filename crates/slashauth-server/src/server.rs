// ============================================
// File: crates/slashauth-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Main server implementation that wires the services together, drives
//! each connection through its state machine, and manages the listener
//! lifecycle.
//!
//! ## Main Functionality
//! - `AuthServer`: cheap-to-clone handle to the running server
//! - `AuthServerBuilder`: construction with fail-fast configuration checks
//! - `serve_connection`: one connection over any `Transport`
//! - `run` / `run_on`: accept loop over TCP or the HTTP tunnel with
//!   graceful shutdown
//! - `format_challenge_url`: the out-of-band bootstrap value
//!
//! ## Connection State Machine
//! ```text
//! ┌───────────┐ ClientHello ┌───────────────────┐
//! │ Listening │ ──────────► │ HandshakeComplete │   (encrypted mode only)
//! └─────┬─────┘             └─────────┬─────────┘
//!       │ request (plain)             │ request
//!       ▼                             ▼
//! ┌──────────────────────────────────────────┐
//! │ Servicing  ◄── one response per request  │
//! └─────────────────────┬────────────────────┘
//!                       │ disconnect / idle / fatal error / shutdown
//!                       ▼
//!                 ┌──────────┐
//!                 │  Closed  │
//!                 └──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Request-level failures are answered, connection-level failures
//!   (unparseable frames, handshake or decryption failure) close
//! - Each connection takes its responder snapshot at handshake time;
//!   rotation only affects later connections
//! - Use tokio::select! for shutdown-aware loops
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation
//! v0.1.1 - Generic listener, HTTP tunnel transport, single shutdown grace

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use slashauth_core::crypto::{
    CryptoProvider, DefaultCryptoProvider, HandshakeCrypto, IdentityKeyPair, IdentityPublicKey,
    SecureChannel,
};
use slashauth_core::protocol::codec;
use slashauth_core::protocol::{
    ChallengeUrl, ChannelMode, ClientHello, EncryptedEnvelope, RequestEnvelope,
};
use slashauth_transport::{
    HttpTunnelListener, TcpTransportListener, Transport, TransportError, TransportListener,
};

use crate::config::{ServerConfig, TransportKind};
use crate::error::{Result, ServerError};
use crate::services::{
    AuthHandlers, Dispatcher, MemoryTokenStorage, Peer, ResponderSlot, TokenStorage, TokenStore,
};

/// Time granted to all open connections together after shutdown is
/// signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================
// ConnectionState
// ============================================

/// Per-connection lifecycle, see the module diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the first frame.
    Listening,
    /// Channel established, no request yet.
    HandshakeComplete,
    /// At least one request handled.
    Servicing,
    /// Connection finished.
    Closed,
}

// ============================================
// AuthServer
// ============================================

struct ServerInner {
    config: ServerConfig,
    identity: IdentityKeyPair,
    dispatcher: Dispatcher,
    responder: Arc<ResponderSlot>,
    tokens: Arc<TokenStore>,
    connections: Arc<Semaphore>,
    shutdown: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// SlashAuth server handle.
///
/// # Lifecycle
/// 1. Build with `AuthServer::builder()`
/// 2. Feed connections with `serve_connection`, or call `run()`
/// 3. Stop via `shutdown()` or Ctrl+C
#[derive(Clone)]
pub struct AuthServer {
    inner: Arc<ServerInner>,
}

impl AuthServer {
    /// Starts building a server.
    #[must_use]
    pub fn builder() -> AuthServerBuilder {
        AuthServerBuilder::default()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Plain or encrypted.
    #[must_use]
    pub fn mode(&self) -> ChannelMode {
        self.inner.config.channel.mode
    }

    /// Shared token store.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.inner.tokens
    }

    /// Long-term key that signs plain-mode responses.
    #[must_use]
    pub fn signing_public_key(&self) -> IdentityPublicKey {
        self.inner.identity.public_key()
    }

    /// Key the next handshake will be answered with.
    #[must_use]
    pub fn responder_public_key(&self) -> IdentityPublicKey {
        self.inner.responder.public_key()
    }

    /// Key a client must be configured with: the responder key in
    /// encrypted mode, the signing key in plain mode.
    #[must_use]
    pub fn advertised_public_key(&self) -> IdentityPublicKey {
        if self.mode().is_encrypted() {
            self.responder_public_key()
        } else {
            self.signing_public_key()
        }
    }

    /// Builds the challenge URL for `token`, carrying the relay address
    /// and the key the client must expect.
    #[must_use]
    pub fn format_challenge_url(&self, token: &str) -> String {
        ChallengeUrl::new(&self.inner.config.network.public_url, token)
            .with_relay(self.inner.config.advertised_relay())
            .with_server_key(self.advertised_public_key().to_hex())
            .format()
    }

    // ========================================
    // Connection Handling
    // ========================================

    /// Serves one connection until the peer leaves, the idle timeout
    /// expires, or a connection-level error occurs.
    ///
    /// # Errors
    /// Connection-level failures: malformed frames, handshake or
    /// decryption failure, transport errors. The transport is closed in
    /// every case.
    pub async fn serve_connection<T: Transport>(&self, mut transport: T) -> Result<()> {
        let mut state = ConnectionState::Listening;
        let result = self.drive(&mut transport, &mut state).await;

        if let Err(e) = transport.close().await {
            debug!("Transport close error: {}", e);
        }

        match &result {
            Ok(()) => debug!(last_state = ?state, "Connection closed"),
            Err(e) if e.is_suspicious() => {
                warn!(last_state = ?state, error = %e, "Connection dropped");
            }
            Err(e) => debug!(last_state = ?state, error = %e, "Connection dropped"),
        }
        state = ConnectionState::Closed;
        debug!(state = ?state, "Connection finished");
        result
    }

    async fn drive<T: Transport>(
        &self,
        transport: &mut T,
        state: &mut ConnectionState,
    ) -> Result<()> {
        let idle = self.inner.config.idle_timeout();

        let mut channel = if self.mode().is_encrypted() {
            let Some(frame) = Self::next_frame(transport, idle).await? else {
                return Ok(());
            };
            let channel = self.accept_handshake(transport, &frame).await?;
            *state = ConnectionState::HandshakeComplete;
            Some(channel)
        } else {
            None
        };

        loop {
            let Some(frame) = Self::next_frame(transport, idle).await? else {
                return Ok(());
            };
            *state = ConnectionState::Servicing;

            let reply = match channel.as_mut() {
                None => {
                    let request: RequestEnvelope = codec::decode(&frame)?;
                    let response = self.inner.dispatcher.dispatch(&request, &Peer::Plain).await;
                    codec::encode(&response)?
                }
                Some(channel) => {
                    let envelope: EncryptedEnvelope = codec::decode(&frame)?;
                    let plaintext = channel.decrypt_from_base64(&envelope.encrypted)?;
                    let request: RequestEnvelope = codec::decode(&plaintext)?;

                    let peer = Peer::Channel(*channel.remote_static_key());
                    let response = self.inner.dispatcher.dispatch(&request, &peer).await;

                    let encrypted = channel.encrypt_to_base64(&codec::encode(&response)?)?;
                    codec::encode(&EncryptedEnvelope { encrypted })?
                }
            };

            transport.send(&reply).await?;
        }
    }

    async fn accept_handshake<T: Transport>(
        &self,
        transport: &mut T,
        frame: &[u8],
    ) -> Result<SecureChannel> {
        let hello: ClientHello = codec::decode(frame)?;
        let responder = self.inner.responder.current();
        let (reply, channel) = responder.respond(&hello)?;
        transport.send(&codec::encode(&reply)?).await?;

        info!(
            session_id = ?channel.session_id(),
            client = %channel.remote_static_key(),
            "Handshake complete"
        );
        Ok(channel)
    }

    /// Next frame, or `None` when the peer left or stayed idle too long.
    async fn next_frame<T: Transport>(transport: &mut T, idle: Duration) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(idle, transport.receive()).await {
            Err(_) => {
                debug!("Connection idle for {:?}, closing", idle);
                Ok(None)
            }
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(TransportError::Disconnected)) => Ok(None),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    // ========================================
    // Listener
    // ========================================

    /// Binds `network.listen_addr` with the configured transport and serves
    /// until Ctrl+C or [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    /// `StartupFailed` if the listener cannot be bound.
    pub async fn run(&self) -> Result<()> {
        info!("Starting SlashAuth server v{}", env!("CARGO_PKG_VERSION"));

        let config = &self.inner.config;
        let listen_addr = config.network.listen_addr.to_string();
        match config.network.transport {
            TransportKind::Tcp => {
                let listener = TcpTransportListener::bind(&listen_addr)
                    .await
                    .map_err(|e| ServerError::startup_failed(format!("TCP bind failed: {e}")))?;
                self.serve_until_interrupted(listener).await
            }
            TransportKind::HttpTunnel => {
                let path = config.tunnel_path()?;
                let listener = HttpTunnelListener::bind(&listen_addr, path)
                    .await
                    .map_err(|e| ServerError::startup_failed(format!("HTTP bind failed: {e}")))?;
                self.serve_until_interrupted(listener).await
            }
        }
    }

    async fn serve_until_interrupted<L: TransportListener>(&self, listener: L) -> Result<()> {
        let server = self.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                server.shutdown();
            }
        });

        let result = self.run_on(listener).await;
        signal.abort();
        result
    }

    /// Serves connections from an already-bound listener until
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    /// Currently always `Ok`; accept errors are logged and skipped.
    pub async fn run_on<L: TransportListener>(&self, listener: L) -> Result<()> {
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let mut tasks = JoinSet::new();

        info!(
            addr = %listener.local_addr(),
            transport = %self.inner.config.network.transport,
            mode = %self.mode(),
            responder = %self.responder_public_key(),
            "Server started successfully"
        );

        while !self.inner.shutdown.load(Ordering::SeqCst) {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }
                accepted = listener.accept() => {
                    let (transport, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&self.inner.connections).try_acquire_owned() else {
                        warn!(client = %addr, "Connection limit reached, dropping");
                        continue;
                    };

                    while tasks.try_join_next().is_some() {}
                    tasks.spawn(self.connection_task(transport, addr, permit));
                }
            }
        }

        info!("Shutting down server...");
        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!(remaining = tasks.len(), "Connection tasks timed out during shutdown, aborting");
            tasks.abort_all();
        }
        info!("Server shutdown complete");
        Ok(())
    }

    fn connection_task<T: Transport + 'static>(
        &self,
        transport: T,
        addr: std::net::SocketAddr,
        permit: tokio::sync::OwnedSemaphorePermit,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let server = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        async move {
            let _permit = permit;
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(client = %addr, "Connection cancelled by shutdown");
                }
                result = server.serve_connection(transport) => {
                    if let Err(e) = result {
                        debug!(client = %addr, error = %e, "Connection ended with error");
                    }
                }
            }
        }
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let _ = self.inner.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for AuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthServer")
            .field("listen_addr", &self.inner.config.network.listen_addr)
            .field("mode", &self.mode())
            .field("signing_key", &self.signing_public_key())
            .finish_non_exhaustive()
    }
}

// ============================================
// AuthServerBuilder
// ============================================

/// Builder for [`AuthServer`].
///
/// # Example
/// ```ignore
/// let server = AuthServer::builder()
///     .config(config)
///     .key_pair(identity)
///     .handlers(MyHandlers)
///     .build()?;
/// ```
#[derive(Default)]
pub struct AuthServerBuilder {
    config: ServerConfig,
    identity: Option<IdentityKeyPair>,
    handlers: Option<Arc<dyn AuthHandlers>>,
    storage: Option<Arc<dyn TokenStorage>>,
    provider: Option<Arc<dyn CryptoProvider>>,
}

impl AuthServerBuilder {
    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the channel mode.
    #[must_use]
    pub fn mode(mut self, mode: ChannelMode) -> Self {
        self.config.channel.mode = mode;
        self
    }

    /// Enables responder rotation after each `requestToken`.
    #[must_use]
    pub fn rotate_responder_key(mut self, enabled: bool) -> Self {
        self.config.channel.rotate_responder_key = enabled;
        self
    }

    /// Sets the server's long-term identity.
    #[must_use]
    pub fn key_pair(mut self, identity: IdentityKeyPair) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the application callbacks.
    #[must_use]
    pub fn handlers(mut self, handlers: impl AuthHandlers + 'static) -> Self {
        self.handlers = Some(Arc::new(handlers));
        self
    }

    /// Sets already-shared application callbacks.
    #[must_use]
    pub fn shared_handlers(mut self, handlers: Arc<dyn AuthHandlers>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Sets the token backend (default: in-memory).
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the crypto provider (default: [`DefaultCryptoProvider`]).
    #[must_use]
    pub fn crypto_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Builds the server.
    ///
    /// # Errors
    /// - `Configuration`: missing key pair or handlers
    /// - `ConfigInvalid`: configuration fails validation
    pub fn build(self) -> Result<AuthServer> {
        let identity = self
            .identity
            .ok_or_else(|| ServerError::configuration("No key pair provided"))?;
        let handlers = self
            .handlers
            .ok_or_else(|| ServerError::configuration("No handlers provided"))?;
        self.config.validate()?;

        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(DefaultCryptoProvider));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryTokenStorage::new()));

        let tokens = Arc::new(TokenStore::new(storage, Arc::clone(&provider)));
        let responder = Arc::new(ResponderSlot::new(
            identity.clone(),
            self.config.channel.max_timestamp_skew_secs,
        ));
        let dispatcher = Dispatcher::new(
            identity.clone(),
            provider,
            Arc::clone(&tokens),
            handlers,
            Arc::clone(&responder),
        )
        .with_rotation(self.config.channel.rotate_responder_key)
        .with_nonce_window(self.config.channel.max_timestamp_skew_secs);

        let (shutdown_tx, _) = broadcast::channel(1);
        let connections = Arc::new(Semaphore::new(self.config.limits.max_connections));

        debug!(
            mode = %self.config.channel.mode,
            signing_key = %identity.public_key(),
            "Server built"
        );

        Ok(AuthServer {
            inner: Arc::new(ServerInner {
                config: self.config,
                identity,
                dispatcher,
                responder,
                tokens,
                connections,
                shutdown: AtomicBool::new(false),
                shutdown_tx,
            }),
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use slashauth_core::crypto::{canonicalize, handshake};
    use slashauth_core::protocol::{Method, ResponseEnvelope, ServerHello};
    use slashauth_transport::MemoryTransport;

    struct AllowAll;

    #[async_trait]
    impl AuthHandlers for AllowAll {
        async fn authz(&self, _public_key: &str, _token: &str) -> anyhow::Result<Value> {
            Ok(json!({ "status": "ok" }))
        }

        async fn magiclink(&self, _public_key: &str) -> anyhow::Result<Value> {
            Ok(json!({ "url": "https://example.com/m", "validUntil": 1 }))
        }
    }

    fn server(mode: ChannelMode) -> AuthServer {
        AuthServer::builder()
            .mode(mode)
            .key_pair(IdentityKeyPair::generate())
            .handlers(AllowAll)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = AuthServer::builder().handlers(AllowAll).build().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: No key pair provided");

        let err = AuthServer::builder()
            .key_pair(IdentityKeyPair::generate())
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: No handlers provided");

        let err = AuthServer::builder()
            .key_pair(IdentityKeyPair::generate())
            .handlers(AllowAll)
            .mode(ChannelMode::Plain)
            .rotate_responder_key(true)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_format_challenge_url() {
        let server = server(ChannelMode::Encrypted);
        let url = ChallengeUrl::parse(&server.format_challenge_url("abc123")).unwrap();
        assert_eq!(url.base, "slashauth://127.0.0.1:8787/auth");
        assert_eq!(url.token, "abc123");
        assert_eq!(url.relay.as_deref(), Some("127.0.0.1:8787"));
        assert_eq!(url.server_key, Some(server.responder_public_key().to_hex()));
    }

    #[tokio::test]
    async fn test_plain_connection_answers_errors_in_band() {
        let server = server(ChannelMode::Plain);
        let (mut client, conn) = MemoryTransport::pair();
        let task = tokio::spawn({
            let server = server.clone();
            async move { server.serve_connection(conn).await }
        });

        let identity = IdentityKeyPair::generate();
        let pk = identity.public_key_hex();
        let forged = RequestEnvelope::new(Method::Authz, json!({ "token": "deadbeef" }), &pk)
            .signed("deadbeef", hex::encode([0u8; 64]));
        client.send(&codec::encode(&forged).unwrap()).await.unwrap();
        let response: ResponseEnvelope = codec::decode(&client.receive().await.unwrap()).unwrap();
        assert_eq!(response.error.unwrap().message, "Invalid signature");

        // Same connection keeps serving
        let signature = hex::encode(identity.sign(&canonicalize("n", &pk)));
        let request =
            RequestEnvelope::new(Method::RequestToken, json!({}), &pk).signed("n", signature);
        client.send(&codec::encode(&request).unwrap()).await.unwrap();
        let response: ResponseEnvelope = codec::decode(&client.receive().await.unwrap()).unwrap();
        assert!(response.result.unwrap()["token"].is_string());

        client.close().await.unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let server = server(ChannelMode::Plain);
        let (mut client, conn) = MemoryTransport::pair();
        let task = tokio::spawn({
            let server = server.clone();
            async move { server.serve_connection(conn).await }
        });

        client.send(b"\x00not json").await.unwrap();
        assert!(task.await.unwrap().is_err());
        assert!(client.receive().await.is_err());
    }

    #[tokio::test]
    async fn test_encrypted_connection_rejects_bad_handshake() {
        let server = server(ChannelMode::Encrypted);
        let (mut client, conn) = MemoryTransport::pair();
        let task = tokio::spawn({
            let server = server.clone();
            async move { server.serve_connection(conn).await }
        });

        let identity = IdentityKeyPair::generate();
        let (mut hello, _) = handshake::initiate(&identity, &server.responder_public_key());
        hello.signature[3] ^= 0x10;
        client.send(&codec::encode(&hello).unwrap()).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ServerError::Core(_))));
    }

    #[tokio::test]
    async fn test_encrypted_connection_serves_requests() {
        let server = server(ChannelMode::Encrypted);
        let (mut client, conn) = MemoryTransport::pair();
        let task = tokio::spawn({
            let server = server.clone();
            async move { server.serve_connection(conn).await }
        });

        let identity = IdentityKeyPair::generate();
        let (hello, pending) = handshake::initiate(&identity, &server.responder_public_key());
        client.send(&codec::encode(&hello).unwrap()).await.unwrap();
        let reply: ServerHello = codec::decode(&client.receive().await.unwrap()).unwrap();
        let mut channel = handshake::complete_initiator(&reply, pending).unwrap();

        let request = RequestEnvelope::new(
            Method::Authz,
            json!({ "token": "t" }),
            identity.public_key_hex(),
        );
        let encrypted = channel
            .encrypt_to_base64(&codec::encode(&request).unwrap())
            .unwrap();
        client
            .send(&codec::encode(&EncryptedEnvelope { encrypted }).unwrap())
            .await
            .unwrap();

        let frame: EncryptedEnvelope = codec::decode(&client.receive().await.unwrap()).unwrap();
        let plaintext = channel.decrypt_from_base64(&frame.encrypted).unwrap();
        let response: ResponseEnvelope = codec::decode(&plaintext).unwrap();
        assert_eq!(response.result.unwrap()["status"], "ok");
        assert!(response.signature.is_none());

        client.close().await.unwrap();
        assert!(task.await.unwrap().is_ok());
    }
}
