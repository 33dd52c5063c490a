//! User registration, login and logout.

use axum::{
    extract::{MatchedPath, State},
    http::{Method, StatusCode},
    Extension,
};
use common::{
    protocol::{AccessTokenView, UserProfile},
    Envelope, ServiceError,
};
use serde_json::Value;
use tracing::info;

use crate::auth::{password, AuthenticatedUser, LoginOutcome};
use crate::server::input::RequestInput;
use crate::server::reply::{ApiResponse, Outcome, Reply};
use crate::server::state::AppState;
use crate::storage::{AccessToken, NewUser, RepositoryError, User};
use crate::validation::Params;

/// Client-facing view of a user and their token.
pub fn profile(user: &User, token: &AccessToken) -> UserProfile {
    UserProfile {
        name: user.name.clone(),
        email: user.email.clone(),
        email_verified: user.verified_at.is_some(),
        phone: user.phone.clone(),
        permissions: user.permissions.clone(),
        avatar: user.avatar.clone(),
        ml_id: user.ml_id.clone(),
        data: user.data.clone(),
        access_token: AccessTokenView {
            token: token.token.clone(),
            expires_at: token.expires_at,
        },
    }
}

fn profile_value(user: &User, token: &AccessToken) -> Result<Value, ServiceError> {
    serde_json::to_value(profile(user, token))
        .map_err(|e| ServiceError::internal(format!("profile not serialisable: {e}")))
}

/// `POST /user`
pub async fn register(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.register,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| create_user(&state, params, envelope),
        )
        .await
}

async fn create_user(
    state: &AppState,
    params: Params,
    envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let email = params.string("email");
    let phone = params.string("phone");
    if email.is_none() && phone.is_none() {
        return Ok(Reply::warn("Email or phone is required").into_outcome(envelope));
    }

    if let Some(email) = &email {
        let taken = state
            .users
            .find_user_by_email(email)
            .await
            .map_err(|e| ServiceError::persistence(format!("user lookup failed: {e}")))?;
        if taken.is_some() {
            return Ok(Reply::warn("This email is already in use").into_outcome(envelope));
        }
    }
    if let Some(phone) = &phone {
        let taken = state
            .users
            .find_user_by_phone(phone)
            .await
            .map_err(|e| ServiceError::persistence(format!("user lookup failed: {e}")))?;
        if taken.is_some() {
            return Ok(Reply::warn("This phone is already in use").into_outcome(envelope));
        }
    }

    let plain = params.string("password").unwrap_or_default();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| ServiceError::internal(format!("password hashing aborted: {e}")))?
        .map_err(|e| ServiceError::internal(format!("password hashing failed: {e}")))?;

    let created = state
        .users
        .create_user(NewUser {
            name: params.string("name").unwrap_or_default(),
            email,
            phone,
            password_hash,
        })
        .await;
    // Uniqueness is checked above; a concurrent registration can still win.
    let user = match created {
        Ok(user) => user,
        Err(RepositoryError::Duplicate("email")) => {
            return Ok(Reply::warn("This email is already in use").into_outcome(envelope))
        }
        Err(RepositoryError::Duplicate("phone")) => {
            return Ok(Reply::warn("This phone is already in use").into_outcome(envelope))
        }
        Err(e) => return Err(ServiceError::persistence(format!("user not created: {e}"))),
    };

    let token = state.auth.get_token(&user, state.auth.short_ttl()).await?;
    info!(user_id = user.id, "user registered");
    Ok(Reply::success(profile_value(&user, &token)?).into_outcome(envelope))
}

/// `POST /user/auth`
pub async fn login(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.login,
            method.as_str(),
            route.as_str(),
            &input,
            |params, envelope| authenticate(&state, params, envelope),
        )
        .await
}

async fn authenticate(
    state: &AppState,
    params: Params,
    envelope: Envelope,
) -> Result<Outcome, ServiceError> {
    let email = params.str("email").unwrap_or_default();
    let candidate = params.str("password").unwrap_or_default();
    let outcome = state
        .auth
        .login(email, candidate, params.flag("remember_me"))
        .await?;
    let reply = match outcome {
        LoginOutcome::Authenticated { user, token } => {
            Reply::success(profile_value(&user, &token)?)
        }
        LoginOutcome::BadCredentials => Reply::fail("Email or password incorrect."),
        LoginOutcome::RefreshFailed => Reply::fail_with(
            "Unable to refresh access token.",
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    };
    Ok(reply.into_outcome(envelope))
}

/// `DELETE /user/auth`
pub async fn logout(
    State(state): State<AppState>,
    method: Method,
    route: MatchedPath,
    Extension(user): Extension<AuthenticatedUser>,
    RequestInput(input): RequestInput,
) -> ApiResponse {
    state
        .dispatcher
        .dispatch(
            &state.endpoints.logout,
            method.as_str(),
            route.as_str(),
            &input,
            |_, envelope| revoke(&state, user.id, envelope),
        )
        .await
}

async fn revoke(state: &AppState, user_id: u64, envelope: Envelope) -> Result<Outcome, ServiceError> {
    let reply = if state.auth.revoke(user_id).await? {
        Reply::success_message("User logged out")
    } else {
        Reply::fail("Error while revoking token")
    };
    Ok(reply.into_outcome(envelope))
}
