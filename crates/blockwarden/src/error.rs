//! Error type for startup and the agent side of the server.

use blockwarden_auth::AuthError;
use blockwarden_protocol::ProtocolError;
use blockwarden_store::StoreError;
use blockwarden_transport::TransportError;

/// Anything that can stop the panel from starting or an agent task from
/// running. Each sub-crate error converts in with `?`.
///
/// Request handlers answer with [`ApiError`](crate::http::ApiError)
/// instead, which carries the HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum BlockwardenError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Missing JWT secret or a bcrypt failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}
