//! The auth gate: request middleware in front of every protected route.
//!
//! Per request:
//!
//! ```text
//! unauthenticated ──(credential found)──→ present ──(strategy ok)──→ authorized
//!        │                                   │
//!        └──→ 401 Access token required      └──→ 403 (token) / 401 (session)
//! ```
//!
//! On success the resolved [`Principal`] is inserted into the request
//! extensions, where handlers take it with `Extension<Principal>`. The
//! store is never consulted.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use blockwarden_auth::{AuthError, Principal};

use super::{ApiError, AppState};

/// Cookie that carries the session id in session mode.
pub const SESSION_COOKIE: &str = "blockwarden.sid";

/// Rejects the request unless it carries a credential the configured
/// strategy accepts.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = credential_from(req.headers()).ok_or(AuthError::MissingCredential)?;

    let principal: Principal = state.auth.authenticate(&credential).map_err(|e| {
        tracing::debug!(error = %e, path = %req.uri().path(), "credential rejected");
        e
    })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Finds the presented credential: an `Authorization: Bearer` header,
/// else the session cookie.
pub fn credential_from(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
