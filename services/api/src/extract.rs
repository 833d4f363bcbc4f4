//! Request body extraction for routes that Twilio and browsers both call.
//!
//! Twilio posts `application/x-www-form-urlencoded` bodies while API clients
//! usually send JSON, so the body is decoded according to its `Content-Type`.

use axum::{
    extract::{FromRequest, Request},
    http::{HeaderMap, header::CONTENT_TYPE},
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::handlers::ApiError;

/// Extracts `T` from either a JSON or a urlencoded form body.
pub struct FormOrJson<T>(pub T);

impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json = is_json(req.headers());
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        parse_body(json, &body)
            .map(FormOrJson)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
    }
}

pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

/// Decodes `body` as JSON or as form pairs. An empty body decodes like `{}`.
/// For repeated form keys the last value wins.
pub fn parse_body<T: DeserializeOwned>(json: bool, body: &[u8]) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Object(Map::new()));
    }
    if json {
        return serde_json::from_slice(body);
    }

    let fields: Map<String, Value> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    serde_json::from_value(Value::Object(fields))
}
