//! Axum router construction.

use axum::{
    middleware::from_fn_with_state,
    routing::{any, delete, get, patch, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};
use crate::{items, mercadolivre, users};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    let protected = Router::new()
        .route("/user/auth", delete(users::logout))
        .route(
            "/items",
            get(items::list)
                .post(items::create)
                .patch(items::update)
                .delete(items::delete),
        )
        .route("/items/:id", patch(items::update).delete(items::delete))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_token));

    Router::new()
        .route("/", any(handlers::root))
        .route("/user", post(users::register))
        .route("/user/auth", post(users::login))
        .route("/mercadolivre/oauth", get(mercadolivre::redirect))
        .route(
            "/mercadolivre/oauth/callback",
            get(mercadolivre::callback).post(mercadolivre::callback),
        )
        .route(
            "/mercadolivre/notifications",
            get(mercadolivre::notifications).post(mercadolivre::notifications),
        )
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}
