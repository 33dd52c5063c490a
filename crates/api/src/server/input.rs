//! Raw request input: query parameters merged with a JSON object body.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Query, Request},
    http::StatusCode,
};
use common::{Envelope, MessageKind};
use serde_json::{Map, Value};

use super::reply::ApiResponse;

/// Query string and JSON body fields. Body fields win on conflicts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInput(pub Map<String, Value>);

fn rejection(message: &str) -> ApiResponse {
    let mut envelope = Envelope::new();
    envelope.add_message(message, MessageKind::Error);
    envelope.mark_failure();
    ApiResponse::from_envelope(&envelope, StatusCode::BAD_REQUEST)
}

#[async_trait]
impl<S> FromRequest<S> for RequestInput
where
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut input = match Query::<Map<String, Value>>::try_from_uri(req.uri()) {
            Ok(Query(q)) => q,
            Err(_) => return Err(rejection("Malformed query string.")),
        };

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| rejection("Unreadable request body."))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(input));
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(fields)) => {
                input.extend(fields);
                Ok(Self(input))
            }
            _ => Err(rejection("Request body must be a JSON object.")),
        }
    }
}
