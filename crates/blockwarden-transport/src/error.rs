use std::io;
use std::net::SocketAddr;

/// Failure on the agent channel.
///
/// [`TransportError::Rejected`] and [`TransportError::HandshakeTimedOut`] only
/// refuse that one handshake; the listener carries on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not write to agent: {0}")]
    SendFailed(#[source] io::Error),

    #[error("could not read from agent: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// Binding the listener, accepting a socket or completing the
    /// WebSocket handshake failed.
    #[error("agent listener error: {0}")]
    AcceptFailed(#[source] io::Error),

    #[error("agent from {0} rejected: missing or wrong key")]
    Rejected(SocketAddr),

    #[error("agent from {0} did not finish the WebSocket upgrade in time")]
    HandshakeTimedOut(SocketAddr),
}

#[cfg(feature = "websocket")]
/// Turns a tungstenite failure into the `io::Error` the variants carry.
pub(crate) fn io_error(kind: io::ErrorKind, source: impl ToString) -> io::Error {
    io::Error::new(kind, source.to_string())
}
