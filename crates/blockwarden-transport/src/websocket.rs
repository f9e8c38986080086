//! Agent listener over `tokio-tungstenite`, with the key check done
//! during the HTTP upgrade.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, header};

use crate::error::io_error;
use crate::{Connection, ConnectionId, Transport, TransportError};

/// Starts at 1; 0 is never handed out.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// How long an accepted socket gets to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for agent connections.
///
/// When an agent key is set, the upgrade request must carry it either as
/// `Authorization: Bearer <key>` or as a `key=<key>` query parameter.
/// Anything else is refused with HTTP 401 before the socket opens.
///
/// [`Transport::accept`] performs the upgrade inline. A server juggling
/// many agents should call [`accept_pending`](Self::accept_pending)
/// instead and run [`PendingAgent::upgrade`] on its own task, so a peer
/// that never sends the upgrade request only stalls itself.
pub struct WebSocketTransport {
    listener: TcpListener,
    agent_key: Option<Arc<str>>,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "agent WebSocket transport listening");
        Ok(Self {
            listener,
            agent_key: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Requires every agent to present `key` during the upgrade.
    /// `None` leaves the channel open.
    pub fn with_agent_key(mut self, key: Option<String>) -> Self {
        self.agent_key = key.filter(|k| !k.is_empty()).map(Arc::from);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns `true` if connections must present an agent key.
    pub fn requires_key(&self) -> bool {
        self.agent_key.is_some()
    }

    /// Accepts the next TCP connection without reading from it.
    pub async fn accept_pending(&self) -> Result<PendingAgent, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingAgent {
            stream,
            peer,
            agent_key: self.agent_key.clone(),
            timeout: self.handshake_timeout,
        })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.accept_pending().await?.upgrade().await
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// An accepted socket that has not been upgraded to WebSocket yet.
pub struct PendingAgent {
    stream: TcpStream,
    peer: SocketAddr,
    agent_key: Option<Arc<str>>,
    timeout: Duration,
}

impl PendingAgent {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Runs the upgrade and the key check.
    ///
    /// # Errors
    /// - [`TransportError::Rejected`] when the key is missing or wrong.
    /// - [`TransportError::HandshakeTimedOut`] when the peer does not
    ///   finish the upgrade within the handshake timeout.
    /// - [`TransportError::AcceptFailed`] for any other handshake failure.
    pub async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let PendingAgent {
            stream,
            peer,
            agent_key,
            timeout,
        } = self;

        let rejected = AtomicBool::new(false);
        let check_key = |req: &Request, resp: Response| match agent_key.as_deref() {
            Some(key) if !key_matches(key, presented_key(req).as_deref()) => {
                rejected.store(true, Ordering::Relaxed);
                let mut err = ErrorResponse::new(Some("unauthorized".to_string()));
                *err.status_mut() = StatusCode::UNAUTHORIZED;
                Err(err)
            }
            _ => Ok(resp),
        };

        let handshake = tokio_tungstenite::accept_hdr_async(stream, check_key);
        let ws = match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(_)) if rejected.load(Ordering::Relaxed) => {
                return Err(TransportError::Rejected(peer));
            }
            Ok(Err(e)) => {
                return Err(TransportError::AcceptFailed(io_error(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => return Err(TransportError::HandshakeTimedOut(peer)),
        };

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted agent connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// Compares keys in constant time for equal lengths.
fn key_matches(expected: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|p| bool::from(expected.as_bytes().ct_eq(p.as_bytes())))
}

/// Extracts the agent key from the `Authorization` header or the
/// `key` query parameter, header first.
fn presented_key(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    from_header.or_else(|| {
        req.uri().query().and_then(|q| {
            q.split('&')
                .find_map(|pair| pair.strip_prefix("key="))
                .map(str::to_string)
        })
    })
}

/// A single agent WebSocket connection.
///
/// The socket is split so a pending `recv` never blocks a `send`: the
/// ingress waits for agent frames while panel commands are pushed down
/// the same connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 payloads go out as text frames (the agent listens for
    /// text); anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        io_error(std::io::ErrorKind::ConnectionReset, e),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).expect("valid request")
    }

    #[test]
    fn test_presented_key_reads_bearer_header() {
        let req = request("/", Some("Bearer s3cret"));
        assert_eq!(presented_key(&req).as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_presented_key_reads_query_parameter() {
        let req = request("/?agent=mod&key=s3cret", None);
        assert_eq!(presented_key(&req).as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_key_matches_only_exact_key() {
        assert!(key_matches("s3cret", Some("s3cret")));
        assert!(!key_matches("s3cret", Some("s3creT")));
        assert!(!key_matches("s3cret", Some("s3cret-longer")));
        assert!(!key_matches("s3cret", None));
    }

    #[test]
    fn test_presented_key_missing_returns_none() {
        let req = request("/", Some("Basic Zm9v"));
        assert!(presented_key(&req).is_none());
    }
}
