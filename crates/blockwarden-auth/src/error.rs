//! Error types for the auth layer.

use std::time::Duration;

/// Errors that can occur while authenticating an operator.
///
/// The variants deliberately separate "you sent nothing"
/// ([`MissingCredential`](Self::MissingCredential)) from "you sent
/// something we can't accept" ([`InvalidCredential`](Self::InvalidCredential)):
/// the HTTP layer answers 401 for the first and 403 for the second.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token or session cookie was supplied.
    #[error("access token required")]
    MissingCredential,

    /// A credential was supplied but its signature, expiry, issuer,
    /// audience or structure is wrong.
    #[error("invalid or expired token: {0}")]
    InvalidCredential(String),

    /// The caller is known but not allowed through: a wrong password, an
    /// unknown or expired legacy session, or a role that is too low.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Too many failed login attempts from one address.
    #[error("too many login attempts, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The auth layer is misconfigured (e.g. no signing secret).
    /// Raised at startup, never per request.
    #[error("auth configuration error: {0}")]
    Config(String),

    /// bcrypt failed to hash or parse a stored hash.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}
