//! Common error types shared across crates.

use std::panic::Location;

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::Authentication`] → 401
/// - [`ServiceError::Persistence`], [`ServiceError::Cache`], [`ServiceError::Internal`] → 500
///
/// Validation and not-found failures never become a `ServiceError`; they are
/// turned into envelopes where they are detected. Everything here goes
/// through the single top-level boundary, which only ever shows a generic
/// message to the client.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing, malformed, unknown or expired bearer token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A create/update/delete did not complete.
    #[error("persistence failure: {detail}")]
    Persistence {
        detail: String,
        location: &'static Location<'static>,
    },

    /// A response could not be written to the cache store.
    #[error("cache failure: {detail}")]
    Cache {
        detail: String,
        location: &'static Location<'static>,
    },

    /// An unexpected internal error occurred.
    #[error("internal error: {detail}")]
    Internal {
        detail: String,
        location: &'static Location<'static>,
    },
}

impl ServiceError {
    #[track_caller]
    pub fn persistence(detail: impl Into<String>) -> Self {
        Self::Persistence {
            detail: detail.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn cache(detail: impl Into<String>) -> Self {
        Self::Cache {
            detail: detail.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
            location: Location::caller(),
        }
    }

    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::Authentication(_) => 401,
            ServiceError::Persistence { .. }
            | ServiceError::Cache { .. }
            | ServiceError::Internal { .. } => 500,
        }
    }

    /// Source location captured for the escalated (500) variants.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            ServiceError::Persistence { location, .. }
            | ServiceError::Cache { location, .. }
            | ServiceError::Internal { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Message that is safe to show to any client.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Authentication(_) => "Invalid token.".into(),
            ServiceError::Cache { .. } => "Failed to cache response.".into(),
            ServiceError::Persistence { .. } | ServiceError::Internal { .. } => {
                "Internal server error.".into()
            }
        }
    }
}
