//! Axum middleware applied to the router.
//!
//! Request tracing, timeout enforcement and response compression are tower
//! layers added in [`super::router`]. Bearer-token authentication for
//! protected routes lives here.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::ServiceError;
use tracing::debug;

use super::state::AppState;
use crate::auth::AuthError;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid bearer token; otherwise make the
/// [`crate::auth::AuthenticatedUser`] available as a request extension.
///
/// Every rejection answers 401 `Invalid token.`; the specific reason is only
/// added as a debug message.
pub async fn require_token(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let verified = match bearer_token(req.headers()) {
        Some(token) => state.auth.verify(token).await,
        None => Err(AuthError::Malformed),
    };

    match verified {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(AuthError::Repository(e)) => state
            .dispatcher
            .escalate(ServiceError::persistence(format!("token lookup failed: {e}")))
            .into_response(),
        Err(AuthError::Cache(e)) => state
            .dispatcher
            .escalate(ServiceError::cache(format!("token cache failed: {e}")))
            .into_response(),
        Err(e) => {
            debug!(reason = %e, "bearer token rejected");
            state
                .dispatcher
                .escalate(ServiceError::Authentication(e.debug_message().into()))
                .into_response()
        }
    }
}
