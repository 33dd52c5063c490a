//! Mercado Livre integration: OAuth authorization flow and the notification
//! hook.
//!
//! - `GET /mercadolivre/oauth` redirects to the marketplace authorization page.
//! - `/mercadolivre/oauth/callback` exchanges the authorization code. When
//!   the request also carries a valid bearer token, the marketplace account
//!   is linked to that user.
//! - `/mercadolivre/notifications` acknowledges marketplace notifications by
//!   echoing them back.

pub mod client;

pub use client::{MarketplaceClient, OAuthError};

use axum::{
    extract::{MatchedPath, State},
    http::{header, HeaderMap, Method, StatusCode},
};
use common::{Envelope, ServiceError};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::server::input::RequestInput;
use crate::server::middleware::bearer_token;
use crate::server::reply::{ApiResponse, Outcome, Reply};
use crate::server::state::AppState;
use crate::validation::Params;

const CALLBACK_PATH: &str = "/mercadolivre/oauth/callback";

/// Callback URL on this host, used when no redirect URI is configured.
fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}{CALLBACK_PATH}")
}

/// `GET /mercadolivre/oauth`
pub async fn redirect(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    headers: HeaderMap,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    let fallback = callback_url(&headers);
    state
        .dispatcher
        .dispatch(
            &state.endpoints.oauth_redirect,
            method.as_str(),
            route.as_str(),
            &input,
            |_, envelope| authorize(&state, fallback, envelope),
        )
        .await
}

async fn authorize(
    state: &AppState,
    fallback: String,
    mut envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let url = state
        .marketplace
        .authorization_url(&fallback)
        .map_err(|e| ServiceError::internal(e.to_string()))?;
    envelope.set_data(json!({ "url": url.as_str() }));
    let mut outcome = Reply::info("Redirecting to the Mercado Livre authorization page.")
        .into_outcome(envelope)
        .with_header(header::LOCATION.as_str(), url.as_str());
    outcome.status = StatusCode::FOUND;
    Ok(outcome)
}

/// `GET|POST /mercadolivre/oauth/callback`
pub async fn callback(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    headers: HeaderMap,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    let fallback = callback_url(&headers);
    let bearer = bearer_token(&headers).map(str::to_owned);
    state
        .dispatcher
        .dispatch(
            &state.endpoints.oauth_callback,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| exchange(&state, fallback, bearer, params, envelope),
        )
        .await
}

async fn exchange(
    state: &AppState,
    fallback: String,
    bearer: Option<String>,
    params: Params,
    envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let code = params.str("code").unwrap_or_default();
    let grant = match state
        .marketplace
        .exchange_code(code, &fallback, state.clock.utc())
        .await
    {
        Ok(grant) => grant,
        Err(OAuthError::Rejected { status, message }) => {
            warn!(%status, %message, "marketplace rejected the authorization code");
            return Ok(Reply::fail_with(message, status).into_outcome(envelope));
        }
        Err(e) => return Err(ServiceError::internal(e.to_string())),
    };

    info!(ml_user_id = grant.user_id, "marketplace authorization granted");
    if let Some(bearer) = bearer {
        link_account(state, &bearer, grant.user_id).await?;
    }
    let body = serde_json::to_value(grant)
        .map_err(|e| ServiceError::internal(format!("grant not serialisable: {e}")))?;
    Ok(Reply::success(body).into_outcome(envelope))
}

/// Attach marketplace account `ml_user_id` to the owner of `bearer`. An
/// unverifiable token only skips the link.
async fn link_account(state: &AppState, bearer: &str, ml_user_id: i64) -> Result<(), ServiceError> {
    let user = match state.auth.verify(bearer).await {
        Ok(user) => user,
        Err(e) => {
            debug!(reason = %e, "marketplace account not linked");
            return Ok(());
        }
    };
    if state
        .auth
        .link_marketplace_account(user.id, ml_user_id.to_string())
        .await?
    {
        info!(user_id = user.id, ml_user_id, "marketplace account linked");
    }
    Ok(())
}

/// `GET|POST /mercadolivre/notifications`
pub async fn notifications(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.notifications,
            method.as_str(),
            route.as_str(),
            &input,
            |_, envelope| echo(&input, envelope),
        )
        .await
}

async fn echo(input: &Map<String, Value>, envelope: Envelope) -> Result<Outcome, ServiceError> {
    info!(fields = input.len(), "marketplace notification received");
    Ok(Reply::success(Value::Object(input.clone())).into_outcome(envelope))
}
