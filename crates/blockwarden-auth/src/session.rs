//! Legacy server-side sessions.
//!
//! Before bearer tokens, the panel kept a session table on the server and
//! handed the browser an opaque id in a cookie. Only administrator
//! sessions were let through. [`SessionStrategy`] keeps that scheme
//! available behind [`AuthenticationStrategy`] for deployments that still
//! rely on it.
//!
//! A session tracks:
//! - WHO is logged in (`Principal`)
//! - WHEN the session stops being valid (`expires_at`)

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::{AuthError, AuthenticationStrategy, Principal};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for server-side sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a session stays valid after login.
    ///
    /// Default: 24 hours, the lifetime of the old session cookie.
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerSession
// ---------------------------------------------------------------------------

/// One logged-in operator, as the server remembers them.
#[derive(Debug, Clone)]
pub struct ServerSession {
    pub principal: Principal,
    pub expires_at: Instant,
}

impl ServerSession {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// SessionStrategy
// ---------------------------------------------------------------------------

/// Server-side session authentication.
///
/// ## Lifecycle
///
/// ```text
/// establish() ──→ [valid] ──revoke()──→ removed
///                    │
///                    └──(ttl elapses)──→ [expired] ──→ cleanup_expired()
/// ```
pub struct SessionStrategy {
    /// Session id → session. The id is the credential the client holds.
    sessions: Mutex<HashMap<String, ServerSession>>,
    config: SessionConfig,
}

impl SessionStrategy {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, ServerSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes every expired session. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }

    /// Returns the number of stored sessions (any state).
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

impl AuthenticationStrategy for SessionStrategy {
    fn name(&self) -> &'static str {
        "session"
    }

    fn establish(&self, principal: &Principal) -> Result<String, AuthError> {
        let id = generate_session_id();
        let session = ServerSession {
            principal: principal.clone(),
            expires_at: Instant::now()
                + Duration::from_secs(self.config.ttl_secs),
        };
        self.sessions().insert(id.clone(), session);
        tracing::info!(username = %principal.username, "session created");
        Ok(id)
    }

    fn authenticate(&self, credential: &str) -> Result<Principal, AuthError> {
        let mut sessions = self.sessions();
        let session = sessions
            .get(credential)
            .ok_or_else(|| AuthError::Unauthorized("unknown session".into()))?;

        if session.is_expired(Instant::now()) {
            sessions.remove(credential);
            return Err(AuthError::Unauthorized("session expired".into()));
        }
        if !session.principal.is_admin() {
            return Err(AuthError::Unauthorized(
                "administrator session required".into(),
            ));
        }
        Ok(session.principal.clone())
    }

    fn revoke(&self, credential: &str) {
        if let Some(session) = self.sessions().remove(credential) {
            tracing::info!(
                username = %session.principal.username,
                "session revoked"
            );
        }
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
