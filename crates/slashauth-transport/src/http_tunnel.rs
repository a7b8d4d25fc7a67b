// ============================================
// File: crates/slashauth-transport/src/http_tunnel.rs
// ============================================
//! # HTTP CONNECT Tunnel Transport
//!
//! ## Creation Reason
//! Lets SlashAuth share an `http://` endpoint: the client opens the
//! connection with an HTTP `CONNECT` for the auth path, and once the server
//! answers `200` the socket carries ordinary length-prefixed frames.
//!
//! ## Main Functionality
//! - `TunnelTarget`: dial address and path taken from an `http://` URL
//! - `HttpTunnelTransport::connect`: client side of the upgrade
//! - `HttpTunnelListener`: server side, checks the requested path
//!
//! ## Exchange
//! ```text
//! Client                                         Server
//!   │ CONNECT /auth HTTP/1.1                        │
//!   │ Host: auth.example.com:8080                   │
//!   │ ─────────────────────────────────────────────►│ path == /auth ?
//!   │                                               │
//!   │       HTTP/1.1 200 Connection Established     │ yes
//!   │       Agent: SlashAuth                        │
//!   │ ◄─────────────────────────────────────────────│
//!   │ ════════ length-prefixed frames (tcp.rs) ═════│
//!   │                                               │
//!   │       HTTP/1.1 404 Not Found                  │ no, then close
//!   │ ◄─────────────────────────────────────────────│
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The server reads the request head lazily on the first `receive`, so a
//!   slow client never stalls the accept loop
//! - Heads are read byte by byte; nothing past `\r\n\r\n` is consumed, so
//!   the first frame is never swallowed
//! - Only `http://` URLs; TLS termination belongs in front of the server
//!
//! ## Last Modified
//! v0.1.1 - Initial HTTP tunnel transport

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::tcp::{TcpTransport, TcpTransportListener};
use crate::traits::{Transport, TransportListener};

/// Value of the `Agent` header on tunnel responses.
pub const TUNNEL_AGENT: &str = "SlashAuth";

/// Largest request or response head accepted.
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

// ============================================
// TunnelTarget
// ============================================

/// Where to dial and which path to `CONNECT` to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    /// `host:port` to open the TCP connection to.
    pub addr: String,
    /// Request target of the `CONNECT` line.
    pub path: String,
}

impl TunnelTarget {
    /// Parses `http://host[:port][/path][?query]`. The port defaults to 80
    /// and the path to `/`; the query is ignored.
    ///
    /// ```
    /// use slashauth_transport::http_tunnel::TunnelTarget;
    ///
    /// let target = TunnelTarget::from_url("http://127.0.0.1:8080/auth?token=ab").unwrap();
    /// assert_eq!(target.addr, "127.0.0.1:8080");
    /// assert_eq!(target.path, "/auth");
    /// ```
    ///
    /// # Errors
    /// `InvalidAddress` for other schemes or an empty host.
    pub fn from_url(url: &str) -> Result<Self> {
        let invalid = || TransportError::InvalidAddress {
            addr: url.to_string(),
        };

        let rest = url.strip_prefix("http://").ok_or_else(invalid)?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        if authority.is_empty() || authority.contains('@') {
            return Err(invalid());
        }

        let has_port = match authority.rfind(':') {
            // "[::1]" has colons but no port
            Some(i) => !authority[i..].contains(']'),
            None => false,
        };
        let addr = if has_port {
            authority.to_string()
        } else {
            format!("{authority}:80")
        };

        Ok(Self {
            addr,
            path: path.to_string(),
        })
    }
}

// ============================================
// HttpTunnelTransport
// ============================================

enum TunnelState {
    /// Server side, request head not read yet.
    Pending { stream: TcpStream, path: Arc<str> },
    /// Upgrade done; frames flow.
    Open(TcpTransport),
    /// Rejected, failed or closed.
    Closed,
}

/// Length-prefixed frames over an HTTP `CONNECT` tunnel.
pub struct HttpTunnelTransport {
    state: TunnelState,
}

impl HttpTunnelTransport {
    /// Dials the URL's host and performs the `CONNECT` for its path.
    ///
    /// # Errors
    /// - `InvalidAddress` for a non-`http://` URL
    /// - `ConnectFailed` when the host cannot be reached
    /// - `TunnelRejected` when the server answers anything but `200`
    /// - `Tunnel` for a malformed response head
    pub async fn connect(url: &str) -> Result<Self> {
        let target = TunnelTarget::from_url(url)?;
        let mut stream = TcpStream::connect(target.addr.as_str())
            .await
            .map_err(|e| TransportError::connect_failed(&target.addr, e.to_string()))?;

        let request = format!(
            "CONNECT {} HTTP/1.1\r\nHost: {}\r\nAgent: {TUNNEL_AGENT}\r\n\r\n",
            target.path, target.addr
        );
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| TransportError::io("writing CONNECT request", e))?;

        let head = read_head(&mut stream).await?;
        let status = parse_status(&head)?;
        if status != 200 {
            warn!(status, path = %target.path, "HTTP tunnel refused");
            return Err(TransportError::TunnelRejected { status });
        }

        debug!(addr = %target.addr, path = %target.path, "HTTP tunnel established");
        Ok(Self {
            state: TunnelState::Open(TcpTransport::from_stream(stream)),
        })
    }

    fn pending(stream: TcpStream, path: Arc<str>) -> Self {
        Self {
            state: TunnelState::Pending { stream, path },
        }
    }

    /// Returns the framed transport, answering the `CONNECT` first if that
    /// has not happened yet.
    async fn open(&mut self) -> Result<&mut TcpTransport> {
        if let TunnelState::Pending { .. } = self.state {
            let TunnelState::Pending { stream, path } =
                std::mem::replace(&mut self.state, TunnelState::Closed)
            else {
                return Err(TransportError::Disconnected);
            };
            self.state = TunnelState::Open(accept_connect(stream, &path).await?);
        }

        match &mut self.state {
            TunnelState::Open(transport) => Ok(transport),
            _ => Err(TransportError::Disconnected),
        }
    }
}

impl std::fmt::Debug for HttpTunnelTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            TunnelState::Pending { .. } => "pending",
            TunnelState::Open(_) => "open",
            TunnelState::Closed => "closed",
        };
        f.debug_struct("HttpTunnelTransport")
            .field("state", &state)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTunnelTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.open().await?.send(data).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        self.open().await?.receive().await
    }

    fn is_connected(&self) -> bool {
        match &self.state {
            TunnelState::Pending { .. } => true,
            TunnelState::Open(transport) => transport.is_connected(),
            TunnelState::Closed => false,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TunnelState::Closed) {
            TunnelState::Pending { mut stream, .. } => stream
                .shutdown()
                .await
                .map_err(|e| TransportError::io("shutting down stream", e)),
            TunnelState::Open(mut transport) => transport.close().await,
            TunnelState::Closed => Ok(()),
        }
    }
}

// ============================================
// HttpTunnelListener
// ============================================

/// Accepts HTTP `CONNECT` tunnels for one path.
#[derive(Debug)]
pub struct HttpTunnelListener {
    listener: TcpTransportListener,
    path: Arc<str>,
}

impl HttpTunnelListener {
    /// Binds `addr`; only `CONNECT <path>` requests are upgraded.
    ///
    /// # Errors
    /// As for [`TcpTransportListener::bind`].
    pub async fn bind(addr: impl AsRef<str>, path: impl Into<String>) -> Result<Self> {
        let listener = TcpTransportListener::bind(addr).await?;
        Ok(Self {
            listener,
            path: Arc::from(path.into()),
        })
    }

    /// Path accepted in `CONNECT` requests.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Waits for the next connection. The tunnel is answered on the
    /// transport's first use.
    ///
    /// # Errors
    /// I/O errors from accept.
    pub async fn accept(&self) -> Result<(HttpTunnelTransport, SocketAddr)> {
        let (stream, addr) = self.listener.accept_stream().await?;
        Ok((HttpTunnelTransport::pending(stream, Arc::clone(&self.path)), addr))
    }

    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }
}

#[async_trait]
impl TransportListener for HttpTunnelListener {
    type Transport = HttpTunnelTransport;

    async fn accept(&self) -> Result<(HttpTunnelTransport, SocketAddr)> {
        HttpTunnelListener::accept(self).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }
}

// ============================================
// Head Handling
// ============================================

async fn accept_connect(mut stream: TcpStream, path: &str) -> Result<TcpTransport> {
    let head = read_head(&mut stream).await?;
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    if method != "CONNECT" || target != path {
        debug!(method, requested = target, "Tunnel request for unknown path");
        write_status(&mut stream, "404 Not Found").await?;
        // The peer may already be gone; the rejection stands either way
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown after 404 failed: {}", e);
        }
        return Err(TransportError::TunnelRejected { status: 404 });
    }

    write_status(&mut stream, "200 Connection Established").await?;
    Ok(TcpTransport::from_stream(stream))
}

async fn write_status(stream: &mut TcpStream, status: &str) -> Result<()> {
    let response = format!("HTTP/1.1 {status}\r\nAgent: {TUNNEL_AGENT}\r\n\r\n");
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| TransportError::io("writing tunnel response", e))
}

/// Reads up to and including the blank line that ends an HTTP head.
async fn read_head(stream: &mut TcpStream) -> Result<String> {
    let mut head = Vec::with_capacity(256);
    while !head.ends_with(HEAD_TERMINATOR) {
        if head.len() >= MAX_HEAD_SIZE {
            return Err(TransportError::tunnel("head too large"));
        }
        match stream.read_u8().await {
            Ok(byte) => head.push(byte),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Disconnected);
            }
            Err(e) => return Err(TransportError::io("reading tunnel head", e)),
        }
    }
    String::from_utf8(head).map_err(|_| TransportError::tunnel("head is not UTF-8"))
}

fn parse_status(head: &str) -> Result<u16> {
    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") => code
            .parse()
            .map_err(|_| TransportError::tunnel(format!("bad status line: {status_line}"))),
        _ => Err(TransportError::tunnel(format!("bad status line: {status_line}"))),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn listener(path: &str) -> (HttpTunnelListener, String) {
        let listener = HttpTunnelListener::bind("127.0.0.1:0", path).await.unwrap();
        let addr = listener.local_addr();
        (listener, format!("http://{addr}"))
    }

    #[test]
    fn test_target_from_url() {
        let target = TunnelTarget::from_url("http://auth.example.com/auth?token=ab").unwrap();
        assert_eq!(target.addr, "auth.example.com:80");
        assert_eq!(target.path, "/auth");

        let target = TunnelTarget::from_url("http://[::1]:9000").unwrap();
        assert_eq!(target.addr, "[::1]:9000");
        assert_eq!(target.path, "/");

        assert_eq!(
            TunnelTarget::from_url("http://[::1]/x").unwrap().addr,
            "[::1]:80"
        );
        assert!(TunnelTarget::from_url("https://auth.example.com/auth").is_err());
        assert!(TunnelTarget::from_url("http:///auth").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            parse_status("HTTP/1.1 200 Connection Established\r\nAgent: SlashAuth\r\n\r\n").unwrap(),
            200
        );
        assert_eq!(parse_status("HTTP/1.0 404 Not Found\r\n\r\n").unwrap(), 404);
        assert!(parse_status("SSH-2.0-OpenSSH\r\n\r\n").is_err());
    }

    #[tokio::test]
    async fn test_tunnel_frames_roundtrip() {
        let (listener, base) = listener("/auth").await;

        let server = tokio::spawn(async move {
            let (mut transport, _) = listener.accept().await.unwrap();
            let frame = transport.receive().await.unwrap();
            transport.send(&frame).await.unwrap();
            transport.receive().await
        });

        let mut client = HttpTunnelTransport::connect(&format!("{base}/auth?token=abc"))
            .await
            .unwrap();
        client.send(b"ping").await.unwrap();
        assert_eq!(client.receive().await.unwrap(), b"ping");
        client.close().await.unwrap();

        assert!(matches!(server.await.unwrap(), Err(TransportError::Disconnected)));
    }

    #[tokio::test]
    async fn test_wrong_path_is_404() {
        let (listener, base) = listener("/auth").await;

        let server = tokio::spawn(async move {
            let (mut transport, _) = listener.accept().await.unwrap();
            let result = transport.receive().await;
            (result, transport.is_connected())
        });

        let err = HttpTunnelTransport::connect(&format!("{base}/elsewhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::TunnelRejected { status: 404 }));

        let (result, connected) = server.await.unwrap();
        assert!(matches!(result, Err(TransportError::TunnelRejected { status: 404 })));
        assert!(!connected);
    }

    #[tokio::test]
    async fn test_response_head_carries_agent() {
        let (listener, base) = listener("/auth").await;
        let addr = base.trim_start_matches("http://").to_string();

        tokio::spawn(async move {
            let (mut transport, _) = listener.accept().await.unwrap();
            let _ = transport.receive().await;
        });

        let mut raw = TcpStream::connect(addr.as_str()).await.unwrap();
        raw.write_all(b"CONNECT /auth HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        let head = read_head(&mut raw).await.unwrap();
        assert!(head.starts_with("HTTP/1.1 200 Connection Established\r\n"));
        assert!(head.contains("Agent: SlashAuth\r\n"));
    }
}
