//! Handlers that belong to no feature module.

use axum::{
    extract::{MatchedPath, State},
    http::{Method, StatusCode},
};
use common::{Envelope, ServiceError};

use super::input::RequestInput;
use super::reply::{ApiResponse, Outcome, Reply};
use super::state::AppState;

/// `ANY /` - liveness probe.
pub async fn root(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.root,
            method.as_str(),
            route.as_str(),
            &input,
            |_, envelope| running(envelope),
        )
        .await
}

async fn running(envelope: Envelope) -> Result<Outcome, ServiceError> {
    Ok(Reply::success("API is running".into()).into_outcome(envelope))
}

/// Fallback for unmatched routes.
pub async fn not_found(State(state): State<AppState>) -> ApiResponse {
    Reply::fail_with("Route not found.", StatusCode::NOT_FOUND)
        .into_outcome(state.dispatcher.envelope())
        .into()
}
