//! Principals and the claims that carry them inside a token.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An operator's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    Standard,
}

impl Role {
    /// Maps the store's `is_admin` flag to a role.
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Self::Administrator
        } else {
            Self::Standard
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Administrator => write!(f, "administrator"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

/// An authenticated operator.
///
/// Built from a credential-store row at login, then carried inside the
/// credential itself. The auth gate reconstructs it from the credential
/// without touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub must_change_password: bool,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// The signed payload of a bearer token.
///
/// Field names match what the panel's browser client already decodes:
/// `id`, `username`, `is_admin`, `must_change_password`, plus the
/// registered `iss`, `aud`, `iat` and `exp` claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub must_change_password: bool,
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

impl From<&Claims> for Principal {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username.clone(),
            role: Role::from_admin_flag(claims.is_admin),
            must_change_password: claims.must_change_password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_admin_flag() {
        assert_eq!(Role::from_admin_flag(true), Role::Administrator);
        assert_eq!(Role::from_admin_flag(false), Role::Standard);
    }

    #[test]
    fn test_principal_from_claims_keeps_identity_and_role() {
        let claims = Claims {
            id: 7,
            username: "ops".into(),
            is_admin: false,
            must_change_password: true,
            iss: "x".into(),
            aud: "x".into(),
            iat: 0,
            exp: 1,
        };

        let principal = Principal::from(&claims);

        assert_eq!(principal.id, 7);
        assert_eq!(principal.role, Role::Standard);
        assert!(!principal.is_admin());
        assert!(principal.must_change_password);
    }
}
