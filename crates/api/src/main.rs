//! `marketplace-api` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Create the storage and the shared key-value store.
//! 4. Build the application state (endpoint rules, token store, OAuth client).
//! 5. Build the Axum router and start the HTTP server.

mod auth;
mod cache;
mod config;
mod items;
mod mercadolivre;
mod server;
mod storage;
mod telemetry;
mod users;
mod validation;

use std::sync::Arc;

use anyhow::Result;
use mockable::{Clock, DefaultClock};
use tracing::info;

use cache::MemoryStore;
use config::Config;
use server::state::AppState;
use storage::MemoryDatabase;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        debug = cfg.app_debug,
        "marketplace-api starting"
    );

    // -----------------------------------------------------------------------
    // 3. Storage and cache
    // -----------------------------------------------------------------------
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let db = MemoryDatabase::new(clock.clone());
    let store = Arc::new(MemoryStore::new(clock.clone()));

    // -----------------------------------------------------------------------
    // 4. Application state
    // -----------------------------------------------------------------------
    let state = AppState::new(&cfg, db, store, clock)?;

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
