//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use mockable::Clock;

use super::dispatch::Dispatcher;
use super::rules::EndpointRules;
use crate::auth::AuthTokenStore;
use crate::cache::{KvStore, ResponseCache};
use crate::config::Config;
use crate::mercadolivre::MarketplaceClient;
use crate::storage::{ItemRepository, TokenRepository, UserRepository};

/// Application state shared across all request handlers.
///
/// All fields are `Arc`-backed so Axum can clone the state for each request
/// without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub auth: AuthTokenStore,
    pub users: Arc<dyn UserRepository>,
    pub items: Arc<dyn ItemRepository>,
    pub endpoints: Arc<EndpointRules>,
    pub marketplace: Arc<MarketplaceClient>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the state over one database (serving every repository port) and
    /// one key-value store (serving both the response cache and the token
    /// cache).
    ///
    /// # Errors
    ///
    /// Fails when an endpoint rule does not parse or the outbound HTTP client
    /// cannot be built.
    pub fn new<D>(cfg: &Config, db: D, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Result<Self>
    where
        D: UserRepository + TokenRepository + ItemRepository + Clone + 'static,
    {
        let endpoints = EndpointRules::new(cfg).context("invalid endpoint rules")?;
        let marketplace =
            MarketplaceClient::new(cfg).context("failed to build the marketplace client")?;
        let users: Arc<dyn UserRepository> = Arc::new(db.clone());
        let auth = AuthTokenStore::new(
            users.clone(),
            Arc::new(db.clone()),
            store.clone(),
            clock.clone(),
            cfg.token_short_ttl(),
            cfg.token_long_ttl(),
        );

        Ok(Self {
            dispatcher: Dispatcher::new(ResponseCache::new(store), cfg.app_debug),
            auth,
            users,
            items: Arc::new(db),
            endpoints: Arc::new(endpoints),
            marketplace: Arc::new(marketplace),
            clock,
        })
    }
}
