//! Reply constructors and the HTTP response built from an envelope.

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{Envelope, MessageKind};
use serde_json::Value;
use tracing::warn;

/// The fixed set of ways a handler finishes a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Success, 200, optional info message.
    Info(Option<String>),
    /// Success, 200, optional data (existing data is kept when `None`).
    Success(Option<Value>),
    /// Success, 200, optional success message.
    SuccessMessage(Option<String>),
    /// Failure with an optional warning message.
    Warn(Option<String>, StatusCode),
    /// Failure with an optional error message.
    Fail(Option<String>, StatusCode),
}

impl Reply {
    pub fn info(message: impl Into<String>) -> Self {
        Reply::Info(Some(message.into()))
    }

    pub fn success(data: Value) -> Self {
        Reply::Success(Some(data))
    }

    pub fn success_message(message: impl Into<String>) -> Self {
        Reply::SuccessMessage(Some(message.into()))
    }

    /// Failure, 400, error message.
    pub fn fail(message: impl Into<String>) -> Self {
        Reply::Fail(Some(message.into()), StatusCode::BAD_REQUEST)
    }

    pub fn fail_with(message: impl Into<String>, status: StatusCode) -> Self {
        Reply::Fail(Some(message.into()), status)
    }

    /// Failure, 400, warning message.
    pub fn warn(message: impl Into<String>) -> Self {
        Reply::Warn(Some(message.into()), StatusCode::BAD_REQUEST)
    }

    /// Apply the reply to `envelope`.
    pub fn into_outcome(self, mut envelope: Envelope) -> Outcome {
        let status = match self {
            Reply::Info(message) => {
                if let Some(m) = message {
                    envelope.add_message(m, MessageKind::Info);
                }
                envelope.mark_success();
                StatusCode::OK
            }
            Reply::Success(data) => {
                if let Some(d) = data {
                    envelope.set_data(d);
                }
                envelope.mark_success();
                StatusCode::OK
            }
            Reply::SuccessMessage(message) => {
                if let Some(m) = message {
                    envelope.add_message(m, MessageKind::Success);
                }
                envelope.mark_success();
                StatusCode::OK
            }
            Reply::Warn(message, status) => {
                if let Some(m) = message {
                    envelope.add_message(m, MessageKind::Warning);
                }
                envelope.mark_failure();
                status
            }
            Reply::Fail(message, status) => {
                if let Some(m) = message {
                    envelope.add_message(m, MessageKind::Error);
                }
                envelope.mark_failure();
                status
            }
        };
        Outcome {
            envelope,
            status,
            headers: Vec::new(),
        }
    }
}

/// A finished envelope with its status and extra headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub envelope: Envelope,
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
}

impl Outcome {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Serialised response: status, extra headers and the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ApiResponse {
    pub fn from_envelope(envelope: &Envelope, status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: envelope.to_value(),
        }
    }
}

impl From<Outcome> for ApiResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            status: outcome.status,
            headers: outcome.headers,
            body: outcome.envelope.to_value(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(n), Ok(v)) => {
                    headers.append(n, v);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        (self.status, headers, Json(self.body)).into_response()
    }
}
