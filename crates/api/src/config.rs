//! Configuration loading and validation for the API service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint. Spans are only exported when this is set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Debug/development mode: keeps debug envelope messages and appends
    /// internal error detail to 500 responses.
    #[serde(default)]
    pub app_debug: bool,

    /// Default lifetime of a cached response.
    #[serde(default = "default_response_cache_ttl")]
    pub response_cache_ttl_secs: u64,

    /// Lifetime of a regular access token.
    #[serde(default = "default_token_short_ttl")]
    pub token_short_ttl_hours: i64,

    /// Lifetime of a "remember me" access token.
    #[serde(default = "default_token_long_ttl")]
    pub token_long_ttl_hours: i64,

    /// Page size for item listings. The `limit` parameter may go up to twice this.
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,

    /// Mercado Livre OAuth application id.
    #[serde(default)]
    pub ml_client_id: Option<String>,

    /// Mercado Livre OAuth application secret.
    #[serde(default)]
    pub ml_client_secret: Option<String>,

    /// Redirect URI registered with Mercado Livre.
    #[serde(default)]
    pub ml_redirect_uri: Option<String>,

    #[serde(default = "default_ml_auth_url")]
    pub ml_auth_url: String,

    #[serde(default = "default_ml_token_url")]
    pub ml_token_url: String,

    /// Timeout for calls to Mercado Livre.
    #[serde(default = "default_ml_timeout")]
    pub ml_timeout_secs: u64,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}
fn default_response_cache_ttl() -> u64 {
    60
}
fn default_token_short_ttl() -> i64 {
    24 * 7
}
fn default_token_long_ttl() -> i64 {
    24 * 30
}
fn default_items_per_page() -> u32 {
    40
}
fn default_ml_auth_url() -> String {
    "https://auth.mercadolivre.com.br/authorization".into()
}
fn default_ml_token_url() -> String {
    "https://api.mercadolibre.com/oauth/token".into()
}
fn default_ml_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
            app_debug: false,
            response_cache_ttl_secs: default_response_cache_ttl(),
            token_short_ttl_hours: default_token_short_ttl(),
            token_long_ttl_hours: default_token_long_ttl(),
            items_per_page: default_items_per_page(),
            ml_client_id: None,
            ml_client_secret: None,
            ml_redirect_uri: None,
            ml_auth_url: default_ml_auth_url(),
            ml_token_url: default_ml_token_url(),
            ml_timeout_secs: default_ml_timeout(),
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.response_cache_ttl_secs == 0 {
            anyhow::bail!("RESPONSE_CACHE_TTL_SECS must be > 0");
        }
        if self.token_short_ttl_hours <= 0 {
            anyhow::bail!("TOKEN_SHORT_TTL_HOURS must be > 0");
        }
        if self.token_long_ttl_hours < self.token_short_ttl_hours {
            anyhow::bail!("TOKEN_LONG_TTL_HOURS must be >= TOKEN_SHORT_TTL_HOURS");
        }
        if self.items_per_page == 0 {
            anyhow::bail!("ITEMS_PER_PAGE must be > 0");
        }
        if self.ml_timeout_secs == 0 {
            anyhow::bail!("ML_TIMEOUT_SECS must be > 0");
        }
        Ok(())
    }

    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_ttl_secs)
    }

    pub fn token_short_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_short_ttl_hours)
    }

    pub fn token_long_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_long_ttl_hours)
    }
}
