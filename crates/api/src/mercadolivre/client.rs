//! Outbound OAuth client for the Mercado Livre marketplace.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::protocol::MarketplaceGrant;
use reqwest::{header, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("marketplace OAuth is not configured: {0} is missing")]
    NotConfigured(&'static str),

    /// The marketplace answered 4xx; `message` is its own explanation.
    #[error("marketplace rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("marketplace answered {0}")]
    Upstream(StatusCode),

    #[error("marketplace request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid marketplace URL: {0}")]
    BadUrl(String),

    #[error("marketplace token lifetime out of range: {0}s")]
    BadExpiry(i64),
}

/// Body of a successful token exchange.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user_id: i64,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

impl MarketplaceClient {
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(cfg: &Config) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.ml_timeout_secs))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            auth_url: cfg.ml_auth_url.clone(),
            token_url: cfg.ml_token_url.clone(),
            client_id: cfg.ml_client_id.clone(),
            client_secret: cfg.ml_client_secret.clone(),
            redirect_uri: cfg.ml_redirect_uri.clone(),
        })
    }

    fn redirect_uri<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.redirect_uri.as_deref().unwrap_or(fallback)
    }

    /// Authorization page the user is sent to. `fallback_redirect` is used
    /// when no redirect URI is configured.
    ///
    /// # Errors
    ///
    /// [`OAuthError::NotConfigured`] without a client id, [`OAuthError::BadUrl`]
    /// for a malformed authorization URL.
    pub fn authorization_url(&self, fallback_redirect: &str) -> Result<Url, OAuthError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(OAuthError::NotConfigured("ML_CLIENT_ID"))?;
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri(fallback_redirect)),
            ],
        )
        .map_err(|e| OAuthError::BadUrl(e.to_string()))?;
        Ok(url)
    }

    /// Exchange an authorization code for a grant. `now` anchors the absolute
    /// expiry.
    ///
    /// # Errors
    ///
    /// [`OAuthError::Rejected`] for 4xx answers, [`OAuthError::Upstream`] for
    /// other non-success answers, [`OAuthError::Transport`] for network and
    /// decoding failures, [`OAuthError::BadExpiry`] when `expires_in` cannot
    /// be placed on the calendar.
    pub async fn exchange_code(
        &self,
        code: &str,
        fallback_redirect: &str,
        now: DateTime<Utc>,
    ) -> Result<MarketplaceGrant, OAuthError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(OAuthError::NotConfigured("ML_CLIENT_ID"))?;
        let client_secret = self
            .client_secret
            .as_deref()
            .ok_or(OAuthError::NotConfigured("ML_CLIENT_SECRET"))?;

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("redirect_uri", self.redirect_uri(fallback_redirect)),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.json::<ErrorResponse>().await.ok();
            let message = body
                .and_then(|b| b.message.or(b.error))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request rejected.")
                        .to_owned()
                });
            return Err(OAuthError::Rejected { status, message });
        }
        if !status.is_success() {
            return Err(OAuthError::Upstream(status));
        }

        let token: TokenResponse = resp.json().await?;
        let expires_in = chrono::Duration::try_seconds(token.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(OAuthError::BadExpiry(token.expires_in))?;
        Ok(MarketplaceGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in,
            user_id: token.user_id,
            scopes: token.scope.split_whitespace().map(str::to_owned).collect(),
        })
    }
}
