//! Bearer-token authentication.
//!
//! - [`token`]: token generation and syntax.
//! - [`password`]: Argon2id hashing.
//! - [`store`]: the [`AuthTokenStore`] that issues, verifies, refreshes and
//!   revokes tokens.

pub mod password;
pub mod store;
pub mod token;

pub use store::{AuthError, AuthTokenStore, AuthenticatedUser, LoginOutcome};
