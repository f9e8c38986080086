//! Operator authentication for Blockwarden.
//!
//! This crate answers "who is calling the panel, and may they?":
//!
//! 1. **Passwords**: bcrypt hashing and verification ([`hash_password`])
//! 2. **Tokens**: signed, time-limited bearer credentials ([`TokenIssuer`])
//! 3. **Strategies**: one [`AuthenticationStrategy`] interface over the
//!    stateless token scheme ([`TokenStrategy`]) and the legacy
//!    server-side session scheme ([`SessionStrategy`])
//! 4. **Throttling**: per-address login attempt limits
//!    ([`LoginRateLimiter`])
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP auth gate (above)  ← calls strategy.authenticate() per request
//!     ↕
//! Auth layer (this crate)  ← principals, claims, credentials
//!     ↕
//! Credential store (beside)  ← user rows the login handler turns into principals
//! ```

mod claims;
mod error;
mod password;
mod rate_limit;
mod session;
mod strategy;
mod token;

pub use claims::{Claims, Principal, Role};
pub use error::AuthError;
pub use password::{PASSWORD_COST, hash_password, verify_password};
pub use rate_limit::{LoginRateLimiter, RateLimitConfig};
pub use session::{ServerSession, SessionConfig, SessionStrategy};
pub use strategy::{AuthenticationStrategy, TokenStrategy};
pub use token::{TOKEN_AUDIENCE, TOKEN_ISSUER, TOKEN_VALIDITY, TokenIssuer};
