//! Agent channel for Blockwarden.
//!
//! The game-side agent mod dials in over a socket, streams player
//! snapshots up and receives commands back. [`Transport`] hands out one
//! [`Connection`] per agent; the panel only ever talks to those two traits,
//! so the ingress loop can be driven by something other than a real socket
//! in tests.
//!
//! With the default `websocket` feature, [`WebSocketTransport`] is the
//! listener the server binds.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, PendingAgent, WebSocketConnection, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Identifies one agent link for as long as the process runs.
///
/// Players are routed to the link that last reported them, keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Listener side of the agent channel.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves once an agent has connected and passed the key check.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Address agents should dial. Useful when bound to port 0.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// One live agent link.
///
/// Methods take `&self` so a reader task and a command writer can share
/// the link behind an `Arc`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Pushes one frame to the agent.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next frame from the agent, or `Ok(None)` after a clean close.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_raw_returns_original_value() {
        assert_eq!(ConnectionId::new(42).raw(), 42);
    }

    #[test]
    fn test_connection_id_display_uses_agent_prefix() {
        assert_eq!(ConnectionId::new(7).to_string(), "agent#7");
    }
}
