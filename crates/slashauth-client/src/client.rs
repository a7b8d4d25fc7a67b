// ============================================
// File: crates/slashauth-client/src/client.rs
// ============================================
//! # Auth Client
//!
//! ## Creation Reason
//! Client half of the protocol engine: builds and signs request envelopes,
//! drives the handshake in encrypted mode, and verifies or decrypts the
//! server's replies.
//!
//! ## Main Functionality
//! - `AuthClient::request_token`: obtain a challenge bound to our key
//! - `AuthClient::authz` / `authz_url`: prove possession of our key for a
//!   token received out of band
//! - `AuthClient::magiclink`: `requestToken` + signed `magiclink`
//!
//! ## Client State Machine
//! ```text
//!            first op (encrypted)
//! ┌──────┐ ─────────────────────► ┌─────────────┐ ok  ┌──────────────┐
//! │ Idle │                        │ Handshaking │ ──► │ ChannelReady │
//! └──┬───┘ ◄───────────┐          └──────┬──────┘     └──────┬───────┘
//!    │ op              │ reply           │ failure           │ op
//!    ▼                 │                 ▼                   ▼
//! ┌──────────────────┐ │           ┌────────┐  channel  ┌──────────────────┐
//! │ AwaitingResponse │─┘           │ Failed │ ◄──────── │ AwaitingResponse │
//! └──────────────────┘             └────────┘  failure  └──────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The handshake runs at most once per client; later operations reuse
//!   the channel
//! - `newResponderKey` from a rotating server applies to the NEXT
//!   connection; read it with `rotated_server_key()`
//! - Plain-mode replies must carry a valid server signature; encrypted
//!   replies are authenticated by the channel
//!
//! ## Last Modified
//! v0.1.0 - Initial client implementation
//! v0.1.1 - Timestamped requestToken nonce, HTTP tunnel connect

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use slashauth_core::crypto::{
    handshake, sign_canonical, timestamped_nonce, verify_canonical, CryptoProvider,
    DefaultCryptoProvider, IdentityKeyPair, IdentityPublicKey, SecureChannel,
};
use slashauth_core::protocol::codec;
use slashauth_core::protocol::{
    canonical_json, ChallengeUrl, ChannelMode, EncryptedEnvelope, Method, RequestEnvelope,
    ResponseEnvelope, ServerHello,
};
use slashauth_transport::{HttpTunnelTransport, TcpTransport, Transport, TransportError};

use crate::error::{ClientError, Result};

/// Default bound on the handshake and on one request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const NO_KEY_PAIR: &str = "No key pair provided";
const NO_SERVER_KEY: &str = "No server public key provided";

// ============================================
// ClientState
// ============================================

/// Client lifecycle, see the module diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Ready for the next operation.
    Idle,
    /// Handshake in flight.
    Handshaking,
    /// Channel established, no request sent yet.
    ChannelReady,
    /// Request sent, waiting for the reply.
    AwaitingResponse,
    /// Channel-level failure; the client must be rebuilt.
    Failed,
}

// ============================================
// ClientOptions
// ============================================

/// Per-client tunables.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Plain or encrypted.
    pub mode: ChannelMode,
    /// Bound on the handshake and on each request/response exchange.
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            mode: ChannelMode::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Sets the channel mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================
// AuthClientBuilder
// ============================================

/// Builder for [`AuthClient`].
///
/// The server key is the responder key in encrypted mode and the signing
/// key in plain mode; `AuthServer::format_challenge_url` advertises the
/// right one.
#[derive(Default)]
pub struct AuthClientBuilder {
    identity: Option<IdentityKeyPair>,
    server_key: Option<IdentityPublicKey>,
    options: ClientOptions,
    provider: Option<Arc<dyn CryptoProvider>>,
}

impl AuthClientBuilder {
    /// Sets our identity.
    #[must_use]
    pub fn key_pair(mut self, identity: IdentityKeyPair) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the server key to pin.
    #[must_use]
    pub fn server_key(mut self, key: IdentityPublicKey) -> Self {
        self.server_key = Some(key);
        self
    }

    /// Replaces all options.
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the channel mode.
    #[must_use]
    pub fn mode(mut self, mode: ChannelMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Sets the crypto provider (default: [`DefaultCryptoProvider`]).
    #[must_use]
    pub fn crypto_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Builds a client over an established transport.
    ///
    /// # Errors
    /// `Configuration` when the key pair or server key is missing.
    pub fn build<T: Transport>(self, transport: T) -> Result<AuthClient<T>> {
        let identity = self
            .identity
            .ok_or_else(|| ClientError::configuration(NO_KEY_PAIR))?;
        let server_key = self
            .server_key
            .ok_or_else(|| ClientError::configuration(NO_SERVER_KEY))?;

        Ok(AuthClient {
            identity,
            server_key,
            options: self.options,
            provider: self
                .provider
                .unwrap_or_else(|| Arc::new(DefaultCryptoProvider)),
            transport,
            channel: None,
            state: ClientState::Idle,
            rotated_server_key: None,
        })
    }

    /// Dials `addr` over TCP and builds the client.
    ///
    /// # Errors
    /// `Configuration` as for [`build`](Self::build), checked before
    /// dialing; `Transport` if the connection fails.
    pub async fn connect_tcp(self, addr: &str) -> Result<AuthClient<TcpTransport>> {
        if self.identity.is_none() {
            return Err(ClientError::configuration(NO_KEY_PAIR));
        }
        if self.server_key.is_none() {
            return Err(ClientError::configuration(NO_SERVER_KEY));
        }
        let transport = TcpTransport::connect(addr).await?;
        self.build(transport)
    }

    /// Opens an HTTP CONNECT tunnel to `url` and builds the client.
    ///
    /// # Errors
    /// `Configuration` as for [`connect_tcp`](Self::connect_tcp);
    /// `Transport` if the URL is unusable, the connection fails or the
    /// server rejects the tunnel.
    pub async fn connect_http_tunnel(self, url: &str) -> Result<AuthClient<HttpTunnelTransport>> {
        if self.identity.is_none() {
            return Err(ClientError::configuration(NO_KEY_PAIR));
        }
        if self.server_key.is_none() {
            return Err(ClientError::configuration(NO_SERVER_KEY));
        }
        let transport = HttpTunnelTransport::connect(url).await?;
        self.build(transport)
    }
}

// ============================================
// AuthClient
// ============================================

/// One logical connection to a SlashAuth server.
pub struct AuthClient<T: Transport> {
    identity: IdentityKeyPair,
    server_key: IdentityPublicKey,
    options: ClientOptions,
    provider: Arc<dyn CryptoProvider>,
    transport: T,
    channel: Option<SecureChannel>,
    state: ClientState,
    rotated_server_key: Option<IdentityPublicKey>,
}

impl AuthClient<TcpTransport> {
    /// Starts building a client.
    #[must_use]
    pub fn builder() -> AuthClientBuilder {
        AuthClientBuilder::default()
    }
}

impl<T: Transport> AuthClient<T> {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Plain or encrypted.
    #[must_use]
    pub fn mode(&self) -> ChannelMode {
        self.options.mode
    }

    /// Our public key as sent in envelopes.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        self.identity.public_key_hex()
    }

    /// Server key this client pinned.
    #[must_use]
    pub fn server_key(&self) -> &IdentityPublicKey {
        &self.server_key
    }

    /// Responder key announced by a rotating server, to pin on the next
    /// connection.
    #[must_use]
    pub fn rotated_server_key(&self) -> Option<&IdentityPublicKey> {
        self.rotated_server_key.as_ref()
    }

    /// Key to pin when reconnecting: the rotated key if one was announced.
    #[must_use]
    pub fn next_server_key(&self) -> IdentityPublicKey {
        self.rotated_server_key.unwrap_or(self.server_key)
    }

    // ========================================
    // Operations
    // ========================================

    /// Asks the server for a token bound to our public key.
    ///
    /// # Errors
    /// `Remote` on a server refusal, `Core`/`Transport` on channel or
    /// signature failures.
    pub async fn request_token(&mut self) -> Result<String> {
        let public_key = self.identity.public_key_hex();
        let mut request = RequestEnvelope::new(Method::RequestToken, json!({}), &public_key);
        if !self.options.mode.is_encrypted() {
            let nonce = timestamped_nonce(self.provider.as_ref());
            let signature = sign_canonical(self.provider.as_ref(), &self.identity, &nonce, &public_key);
            request = request.signed(nonce, signature);
        }

        let result = self.call(request).await?;

        if let Some(next) = result.get("newResponderKey").and_then(Value::as_str) {
            let next = IdentityPublicKey::from_hex(next)?;
            info!(responder = %next, "Server announced a new responder key");
            self.rotated_server_key = Some(next);
        }

        result
            .get("token")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| ClientError::unexpected_response("requestToken reply has no token"))
    }

    /// Proves possession of our key for `token` and returns the
    /// application's authorization result.
    ///
    /// # Errors
    /// As for [`request_token`](Self::request_token).
    pub async fn authz(&mut self, token: &str) -> Result<Value> {
        let request = self.signed_token_request(Method::Authz, token);
        self.call(request).await
    }

    /// Runs [`authz`](Self::authz) with the token from a challenge URL.
    ///
    /// # Errors
    /// `Core(InvalidUrl)` for a malformed URL, `Configuration` when the URL
    /// names a server key other than the pinned one.
    pub async fn authz_url(&mut self, url: &str) -> Result<Value> {
        let challenge = ChallengeUrl::parse(url)?;
        if let Some(advertised) = challenge.server_key.as_deref() {
            let advertised = IdentityPublicKey::from_hex(advertised)?;
            if advertised != self.server_key {
                warn!(
                    advertised = %advertised,
                    pinned = %self.server_key,
                    "Challenge URL names a different server key"
                );
                return Err(ClientError::configuration(
                    "Challenge URL server key does not match pinned key",
                ));
            }
        }
        self.authz(&challenge.token).await
    }

    /// Requests a fresh token, then exchanges it for the application's
    /// magic link.
    ///
    /// # Errors
    /// As for [`request_token`](Self::request_token).
    pub async fn magiclink(&mut self) -> Result<Value> {
        let token = self.request_token().await?;
        let request = self.signed_token_request(Method::Magiclink, &token);
        self.call(request).await
    }

    /// Closes the underlying transport.
    ///
    /// # Errors
    /// Transport close errors.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await?;
        Ok(())
    }

    // ========================================
    // Internals
    // ========================================

    fn signed_token_request(&self, method: Method, token: &str) -> RequestEnvelope {
        let public_key = self.identity.public_key_hex();
        let signature = sign_canonical(self.provider.as_ref(), &self.identity, token, &public_key);
        RequestEnvelope::new(method, json!({ "token": token }), public_key).signed(token, signature)
    }

    /// Sends one request and returns the verified result.
    async fn call(&mut self, request: RequestEnvelope) -> Result<Value> {
        if matches!(
            self.state,
            ClientState::Failed | ClientState::Handshaking | ClientState::AwaitingResponse
        ) {
            return Err(ClientError::InvalidState { state: self.state });
        }

        if self.options.mode.is_encrypted() && self.channel.is_none() {
            self.handshake().await?;
        }

        self.state = ClientState::AwaitingResponse;
        debug!(method = %request.method, "Sending request");

        let timeout = self.options.request_timeout;
        let response = match bounded(timeout, "request", self.exchange(&request)).await {
            Ok(response) => response,
            Err(e) => {
                self.state = ClientState::Failed;
                return Err(e);
            }
        };
        self.state = ClientState::Idle;

        self.open_response(&request, response)
    }

    async fn handshake(&mut self) -> Result<()> {
        self.state = ClientState::Handshaking;

        let (hello, pending) = handshake::initiate(&self.identity, &self.server_key);
        let transport = &mut self.transport;
        let exchange = async move {
            transport.send(&codec::encode(&hello)?).await?;
            let frame = transport.receive().await?;
            let reply: ServerHello = codec::decode(&frame)?;
            Ok::<_, ClientError>(handshake::complete_initiator(&reply, pending)?)
        };

        match bounded(self.options.request_timeout, "handshake", exchange).await {
            Ok(channel) => {
                info!(
                    session_id = ?channel.session_id(),
                    server = %channel.remote_static_key(),
                    "Secure channel established"
                );
                self.channel = Some(channel);
                self.state = ClientState::ChannelReady;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Handshake failed");
                self.state = ClientState::Failed;
                Err(e)
            }
        }
    }

    async fn exchange(&mut self, request: &RequestEnvelope) -> Result<ResponseEnvelope> {
        let plaintext = codec::encode(request)?;
        let frame = match self.channel.as_mut() {
            None => plaintext,
            Some(channel) => {
                let encrypted = channel.encrypt_to_base64(&plaintext)?;
                codec::encode(&EncryptedEnvelope { encrypted })?
            }
        };
        self.transport.send(&frame).await?;

        let reply = self.transport.receive().await?;
        let response = match self.channel.as_mut() {
            None => codec::decode(&reply)?,
            Some(channel) => {
                let envelope: EncryptedEnvelope = codec::decode(&reply)?;
                codec::decode(&channel.decrypt_from_base64(&envelope.encrypted)?)?
            }
        };
        Ok(response)
    }

    /// Maps error envelopes to `Remote` and checks plain-mode signatures.
    fn open_response(&self, request: &RequestEnvelope, response: ResponseEnvelope) -> Result<Value> {
        let signature = response.signature.clone();
        let result = response.into_result().map_err(|message| {
            debug!(method = %request.method, %message, "Server returned error");
            ClientError::remote(message)
        })?;

        if self.channel.is_none() {
            let signature = signature
                .ok_or_else(|| ClientError::unexpected_response("reply is not signed"))?;
            let data = canonical_json(&result)?;
            if let Err(e) = verify_canonical(
                self.provider.as_ref(),
                &signature,
                request.binding_nonce(),
                &data,
                &self.server_key,
            ) {
                warn!(
                    method = %request.method,
                    server = %self.server_key,
                    "Server signature did not verify"
                );
                return Err(e.into());
            }
        }

        Ok(result)
    }
}

impl<T: Transport> std::fmt::Debug for AuthClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("public_key", &self.identity.public_key())
            .field("server_key", &self.server_key)
            .field("mode", &self.options.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Bounds `operation` by `timeout`, surfacing expiry as a transport error.
async fn bounded<F, R>(timeout: Duration, operation: &str, future: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| ClientError::from(TransportError::timeout(operation)))?
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use slashauth_core::crypto::{
        canonicalize, nonce_timestamp, DefaultHandshakeCrypto, HandshakeCrypto,
    };
    use slashauth_transport::MemoryTransport;

    fn plain_builder(server: &IdentityKeyPair) -> AuthClientBuilder {
        AuthClient::builder()
            .key_pair(IdentityKeyPair::generate())
            .server_key(server.public_key())
            .mode(ChannelMode::Plain)
    }

    /// Reads one request and answers with `result`, signed by `signer`.
    async fn answer_signed(peer: &mut MemoryTransport, signer: &IdentityKeyPair, result: Value) {
        let request: RequestEnvelope = codec::decode(&peer.receive().await.unwrap()).unwrap();
        let data = canonical_json(&result).unwrap();
        let signature = hex::encode(signer.sign(&canonicalize(request.binding_nonce(), &data)));
        let response = ResponseEnvelope::ok(result).with_signature(signature);
        peer.send(&codec::encode(&response).unwrap()).await.unwrap();
    }

    #[test]
    fn test_builder_requires_keys() {
        let (transport, _peer) = MemoryTransport::pair();
        let err = AuthClient::builder().build(transport).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: No key pair provided");

        let (transport, _peer) = MemoryTransport::pair();
        let err = AuthClient::builder()
            .key_pair(IdentityKeyPair::generate())
            .build(transport)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: No server public key provided"
        );
    }

    #[tokio::test]
    async fn test_tunnel_connect_checks_keys_before_dialing() {
        // Nothing listens here; the key check must fail first
        let err = AuthClient::builder()
            .key_pair(IdentityKeyPair::generate())
            .connect_http_tunnel("http://127.0.0.1:9/auth")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: No server public key provided"
        );
    }

    #[tokio::test]
    async fn test_plain_request_token_is_self_signed() {
        let server = IdentityKeyPair::generate();
        let (transport, mut peer) = MemoryTransport::pair();
        let mut client = plain_builder(&server).build(transport).unwrap();
        let public_key = client.public_key_hex();

        let server_task = tokio::spawn(async move {
            let request: RequestEnvelope = codec::decode(&peer.receive().await.unwrap()).unwrap();
            let pk = IdentityPublicKey::from_hex(&request.public_key).unwrap();
            let nonce = request.nonce.clone().unwrap();
            assert!(nonce_timestamp(&nonce).unwrap().is_recent(5));
            verify_canonical(
                &DefaultCryptoProvider,
                request.signature.as_deref().unwrap(),
                &nonce,
                &request.public_key,
                &pk,
            )
            .unwrap();

            let result = json!({ "token": "abc123" });
            let data = canonical_json(&result).unwrap();
            let signature = hex::encode(server.sign(&canonicalize(&nonce, &data)));
            let response = ResponseEnvelope::ok(result).with_signature(signature);
            peer.send(&codec::encode(&response).unwrap()).await.unwrap();
            request.public_key
        });

        assert_eq!(client.request_token().await.unwrap(), "abc123");
        assert_eq!(server_task.await.unwrap(), public_key);
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[tokio::test]
    async fn test_plain_reply_signed_by_wrong_key_rejected() {
        let server = IdentityKeyPair::generate();
        let impostor = IdentityKeyPair::generate();
        let (transport, mut peer) = MemoryTransport::pair();
        let mut client = plain_builder(&server).build(transport).unwrap();

        tokio::spawn(async move {
            answer_signed(&mut peer, &impostor, json!({ "status": "ok" })).await;
        });

        let err = client.authz("deadbeef").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Core(slashauth_core::error::CoreError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_remote_error_surfaces_message() {
        let server = IdentityKeyPair::generate();
        let (transport, mut peer) = MemoryTransport::pair();
        let mut client = plain_builder(&server).build(transport).unwrap();

        tokio::spawn(async move {
            let _ = peer.receive().await.unwrap();
            let response = ResponseEnvelope::error("Invalid token");
            peer.send(&codec::encode(&response).unwrap()).await.unwrap();
        });

        let err = client.authz("abc").await.unwrap_err();
        assert_eq!(err.remote_message(), Some("Invalid token"));
        // A refusal does not poison the connection
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[tokio::test]
    async fn test_authz_signs_token() {
        let server = IdentityKeyPair::generate();
        let (transport, mut peer) = MemoryTransport::pair();
        let mut client = plain_builder(&server).build(transport).unwrap();

        let server_task = tokio::spawn(async move {
            let request: RequestEnvelope = codec::decode(&peer.receive().await.unwrap()).unwrap();
            let pk = IdentityPublicKey::from_hex(&request.public_key).unwrap();
            assert_eq!(request.token(), Some("tok"));
            assert_eq!(request.nonce.as_deref(), Some("tok"));
            verify_canonical(
                &DefaultCryptoProvider,
                request.signature.as_deref().unwrap(),
                "tok",
                &request.public_key,
                &pk,
            )
            .is_ok()
        });

        // The scripted peer never answers; the timeout ends the call
        client.options.request_timeout = Duration::from_millis(200);
        let err = client.authz("tok").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(client.state(), ClientState::Failed);
        assert!(server_task.await.unwrap());

        // Failed clients refuse further work
        assert!(matches!(
            client.authz("tok").await,
            Err(ClientError::InvalidState {
                state: ClientState::Failed
            })
        ));
    }

    #[tokio::test]
    async fn test_authz_url_checks_server_key() {
        let server = IdentityKeyPair::generate();
        let (transport, _peer) = MemoryTransport::pair();
        let mut client = plain_builder(&server).build(transport).unwrap();

        let other = IdentityKeyPair::generate().public_key_hex();
        let url = ChallengeUrl::new("slashauth://example", "abc")
            .with_server_key(other)
            .format();
        assert!(matches!(
            client.authz_url(&url).await,
            Err(ClientError::Configuration { .. })
        ));
        assert!(matches!(
            client.authz_url("slashauth://example").await,
            Err(ClientError::Core(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypted_handshake_then_request() {
        let server = IdentityKeyPair::generate();
        let responder = DefaultHandshakeCrypto::new(server.clone());
        let (transport, mut peer) = MemoryTransport::pair();
        let mut client = AuthClient::builder()
            .key_pair(IdentityKeyPair::generate())
            .server_key(server.public_key())
            .build(transport)
            .unwrap();
        assert_eq!(client.mode(), ChannelMode::Encrypted);

        tokio::spawn(async move {
            let hello = codec::decode(&peer.receive().await.unwrap()).unwrap();
            let (reply, mut channel) = responder.respond(&hello).unwrap();
            peer.send(&codec::encode(&reply).unwrap()).await.unwrap();

            let frame: EncryptedEnvelope = codec::decode(&peer.receive().await.unwrap()).unwrap();
            let request: RequestEnvelope =
                codec::decode(&channel.decrypt_from_base64(&frame.encrypted).unwrap()).unwrap();
            assert!(request.signature.is_none());

            let next = IdentityKeyPair::generate().public_key_hex();
            let response = ResponseEnvelope::ok(json!({ "token": "t1", "newResponderKey": next }));
            let encrypted = channel
                .encrypt_to_base64(&codec::encode(&response).unwrap())
                .unwrap();
            peer.send(&codec::encode(&EncryptedEnvelope { encrypted }).unwrap())
                .await
                .unwrap();
        });

        assert_eq!(client.request_token().await.unwrap(), "t1");
        let rotated = *client.rotated_server_key().unwrap();
        assert_ne!(rotated, server.public_key());
        assert_eq!(client.next_server_key(), rotated);
        assert_eq!(client.server_key(), &server.public_key());
    }

    #[tokio::test]
    async fn test_handshake_against_wrong_key_fails() {
        let server = IdentityKeyPair::generate();
        let pinned = IdentityKeyPair::generate();
        let responder = DefaultHandshakeCrypto::new(server);
        let (transport, mut peer) = MemoryTransport::pair();
        let mut client = AuthClient::builder()
            .key_pair(IdentityKeyPair::generate())
            .server_key(pinned.public_key())
            .build(transport)
            .unwrap();

        tokio::spawn(async move {
            let hello = codec::decode(&peer.receive().await.unwrap()).unwrap();
            // The responder answers as itself, not as the pinned key
            if let Ok((reply, _)) = responder.respond(&hello) {
                let _ = peer.send(&codec::encode(&reply).unwrap()).await;
            }
        });

        let err = client.request_token().await.unwrap_err();
        assert!(err.is_session_fatal());
        assert_eq!(client.state(), ClientState::Failed);
    }
}
