//! The per-request pipeline: validate → cache lookup → logic → cache store.
//!
//! Every endpoint goes through [`Dispatcher::dispatch`]. Request-scoped state
//! (validated parameters, the active cache key, the envelope) lives in locals
//! of that call and is never shared between requests.
//!
//! Escalated [`ServiceError`]s are turned into envelopes in exactly one place,
//! [`Dispatcher::escalate`]. Outside debug mode the client only sees the
//! generic public message.

use std::future::Future;

use axum::http::StatusCode;
use common::{Envelope, MessageKind, ServiceError};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::reply::{ApiResponse, Outcome, Reply};
use crate::cache::response::inject_marker;
use crate::cache::{CacheEntry, CacheMarker, CachePolicy, ResponseCache};
use crate::validation::{validate, Params, RuleSet};

/// Declared contract of one endpoint: rules, defaults and cache policy.
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    rules: RuleSet,
    defaults: Vec<(&'static str, Value)>,
    cache: Option<CachePolicy>,
}

impl Endpoint {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn with_defaults(mut self, defaults: Vec<(&'static str, Value)>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Cache successful outcomes of this endpoint.
    pub fn cached(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn cache_policy(&self) -> Option<CachePolicy> {
        self.cache
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    cache: ResponseCache,
    debug: bool,
}

impl Dispatcher {
    pub fn new(cache: ResponseCache, debug: bool) -> Self {
        Self { cache, debug }
    }

    /// Fresh envelope honouring the process debug mode.
    pub fn envelope(&self) -> Envelope {
        Envelope::with_debug(self.debug)
    }

    /// Run `logic` for one request.
    ///
    /// `route` is the matched route template, not the concrete URI, so every
    /// `/items/{id}` request shares one short hash.
    pub async fn dispatch<F, Fut>(
        &self,
        endpoint: &Endpoint,
        method: &str,
        route: &str,
        input: &Map<String, Value>,
        logic: F,
    ) -> ApiResponse
    where
        F: FnOnce(Params, Envelope) -> Fut,
        Fut: Future<Output = Result<Outcome, ServiceError>>,
    {
        let params = match validate(endpoint.rules(), input, &endpoint.defaults) {
            Ok(params) => params,
            Err(failure) => {
                debug!(
                    method,
                    route,
                    failures = failure.envelope().messages().len(),
                    "request rejected by validation"
                );
                return ApiResponse::from_envelope(failure.envelope(), StatusCode::BAD_REQUEST);
            }
        };

        let active = endpoint
            .cache_policy()
            .map(|policy| self.cache.activate(method, route, &params, policy));

        if let Some(active) = &active {
            match self.cache.lookup(active).await {
                Ok(Some(entry)) => {
                    debug!(key = active.key(), "response cache hit");
                    return replay(entry);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, key = active.key(), "response cache lookup failed, computing")
                }
            }
        }

        let outcome = match logic(params, self.envelope()).await {
            Ok(outcome) => outcome,
            Err(e) => return self.escalate(e),
        };

        let Some(active) = active else {
            return outcome.into();
        };

        let mut response = ApiResponse::from(outcome);
        let stored = self
            .cache
            .store(
                &active,
                response.body.clone(),
                response.status.as_u16(),
                response.headers.clone(),
            )
            .await;
        match stored {
            Ok(true) => {}
            Ok(false) => return self.escalate(ServiceError::cache("store declined the write")),
            Err(e) => return self.escalate(ServiceError::cache(e.to_string())),
        }
        if active.show_hit() {
            inject_marker(&mut response.body, CacheMarker::Miss);
        }
        response
    }

    /// Convert an escalated error into a failure envelope.
    ///
    /// In debug mode the detail and the `file:line` where the error was raised
    /// are appended as debug messages ahead of the public one.
    pub fn escalate(&self, err: ServiceError) -> ApiResponse {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let location = err
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));

        if status.is_server_error() {
            error!(error = %err, location = location.as_deref(), "request failed");
        } else {
            debug!(error = %err, "request rejected");
        }

        let mut envelope = self.envelope();
        envelope.add_message(err.to_string(), MessageKind::Debug);
        if let Some(location) = location {
            envelope.add_message(location, MessageKind::Debug);
        }
        Reply::fail_with(err.public_message(), status)
            .into_outcome(envelope)
            .into()
    }
}

fn replay(entry: CacheEntry) -> ApiResponse {
    let mut body = entry.body;
    if entry.show_hit {
        inject_marker(&mut body, CacheMarker::Hit);
    }
    ApiResponse {
        status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
        headers: entry.headers,
        body,
    }
}
