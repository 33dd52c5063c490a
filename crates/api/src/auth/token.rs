//! Bearer token values.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Length of every bearer token.
pub const TOKEN_LENGTH: usize = 40;

/// Fresh token: [`TOKEN_LENGTH`] alphanumeric characters from the OS RNG.
pub fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Syntactic check done before any storage or cache access.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
