//! The token issuer: signed, time-limited bearer credentials.
//!
//! Tokens are HS256 JWTs signed with a shared secret. Verification is a
//! pure signature/claims check: no lookup, no server-side state.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, get_current_timestamp};

use crate::{AuthError, Claims, Principal};

/// `iss` claim stamped on and required from every token.
pub const TOKEN_ISSUER: &str = "minecraft-manager";
/// `aud` claim stamped on and required from every token.
pub const TOKEN_AUDIENCE: &str = "minecraft-manager";
/// How long an issued token stays valid.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(8 * 60 * 60);

/// Issues and verifies bearer tokens.
///
/// Construct it once at startup: [`TokenIssuer::new`] refuses an empty
/// secret, and that refusal is meant to stop the process before it
/// serves a single request.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Creates an issuer for the given signing secret.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if the secret is empty.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::Config(
                "JWT signing secret is not configured".into(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issues a token for `principal`, valid for [`TOKEN_VALIDITY`].
    pub fn issue(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_at(principal, get_current_timestamp())
    }

    /// Issues a token as if it had been issued at `issued_at` (unix
    /// seconds).
    pub fn issue_at(
        &self,
        principal: &Principal,
        issued_at: u64,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            id: principal.id,
            username: principal.username.clone(),
            is_admin: principal.is_admin(),
            must_change_password: principal.must_change_password,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: issued_at,
            exp: issued_at + TOKEN_VALIDITY.as_secs(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Config(format!("token signing failed: {e}")))
    }

    /// Verifies a token and returns its claims unchanged.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredential`] on a bad signature, an
    /// expired token, a wrong issuer/audience, or anything that isn't a
    /// well-formed JWT.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn admin() -> Principal {
        Principal {
            id: 1,
            username: "admin".into(),
            role: Role::Administrator,
            must_change_password: true,
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret").expect("valid secret")
    }

    #[test]
    fn test_new_empty_secret_returns_config_error() {
        assert!(matches!(TokenIssuer::new(""), Err(AuthError::Config(_))));
        assert!(matches!(TokenIssuer::new("   "), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_issue_then_verify_returns_same_claims() {
        let issuer = issuer();
        let token = issuer.issue(&admin()).expect("issue");

        let claims = issuer.verify(&token).expect("fresh token verifies");

        assert_eq!(claims.id, 1);
        assert_eq!(claims.username, "admin");
        assert!(claims.is_admin);
        assert!(claims.must_change_password);
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.aud, TOKEN_AUDIENCE);
        assert_eq!(claims.exp - claims.iat, 8 * 60 * 60);
    }

    #[test]
    fn test_verify_expired_token_returns_invalid() {
        let issuer = issuer();
        // Issued nine hours ago → expired one hour ago.
        let issued_at = get_current_timestamp() - 9 * 60 * 60;
        let token = issuer.issue_at(&admin(), issued_at).expect("issue");

        assert!(matches!(
            issuer.verify(&token),
            Err(AuthError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_verify_just_before_expiry_succeeds() {
        let issuer = issuer();
        let issued_at = get_current_timestamp() - (8 * 60 * 60 - 120);
        let token = issuer.issue_at(&admin(), issued_at).expect("issue");

        assert!(issuer.verify(&token).is_ok());
    }

    #[test]
    fn test_verify_mutated_signature_returns_invalid() {
        let issuer = issuer();
        let token = issuer.issue(&admin()).expect("issue");

        // Swap a character in the middle of the signature segment (the
        // final character may only carry padding bits).
        let mut chars: Vec<char> = token.chars().collect();
        let pos = chars.len() - 10;
        chars[pos] = if chars[pos] == 'x' { 'y' } else { 'x' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(
            issuer.verify(&tampered),
            Err(AuthError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_verify_other_secret_returns_invalid() {
        let token = issuer().issue(&admin()).expect("issue");
        let other = TokenIssuer::new("another-secret").expect("valid secret");

        assert!(matches!(
            other.verify(&token),
            Err(AuthError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_verify_garbage_returns_invalid() {
        assert!(matches!(
            issuer().verify("not.a.jwt"),
            Err(AuthError::InvalidCredential(_))
        ));
    }
}
