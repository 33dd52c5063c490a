//! Axum HTTP server, routing, and the request pipeline.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Run every request through [`dispatch::Dispatcher`]: validation, the
//!   response cache, the handler logic and the envelope reply.

pub mod dispatch;
pub mod handlers;
pub mod input;
pub mod middleware;
pub mod reply;
pub mod router;
pub mod rules;
pub mod state;
