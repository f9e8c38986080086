//! The authentication strategy hook.
//!
//! Operators authenticate either with stateless signed tokens or with
//! server-side sessions looked up by id. Both sit behind
//! [`AuthenticationStrategy`] and the server picks one at startup.
//!
//! Methods are synchronous: both schemes are a signature check or a map
//! lookup.

use crate::{AuthError, Principal, TokenIssuer};

/// Establishes and checks operator credentials.
///
/// `Send + Sync + 'static` because one strategy object is shared by every
/// request handler for the life of the server.
pub trait AuthenticationStrategy: Send + Sync + 'static {
    /// Short name for logs (`"token"`, `"session"`).
    fn name(&self) -> &'static str;

    /// Creates a credential for a freshly logged-in principal.
    fn establish(&self, principal: &Principal) -> Result<String, AuthError>;

    /// Resolves a presented credential to its principal.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredential`] or [`AuthError::Unauthorized`],
    /// depending on the scheme.
    fn authenticate(&self, credential: &str) -> Result<Principal, AuthError>;

    /// Invalidates a credential (logout). Schemes without server-side
    /// state can't revoke and simply ignore the call.
    fn revoke(&self, credential: &str);
}

/// Stateless bearer-token authentication (the default).
pub struct TokenStrategy {
    issuer: TokenIssuer,
}

impl TokenStrategy {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }
}

impl AuthenticationStrategy for TokenStrategy {
    fn name(&self) -> &'static str {
        "token"
    }

    fn establish(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issuer.issue(principal)
    }

    fn authenticate(&self, credential: &str) -> Result<Principal, AuthError> {
        let claims = self.issuer.verify(credential)?;
        Ok(Principal::from(&claims))
    }

    fn revoke(&self, _credential: &str) {}
}
