//! Axum Handlers for the REST API
//!
//! This module contains the handlers that place outbound calls and serve the
//! call-control document Twilio fetches once a call connects.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{RawQuery, State},
    http::{
        HeaderMap, Method, StatusCode,
        header::{CONTENT_TYPE, HOST},
    },
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use callbridge_core::{
    call::{CallRequest, redact},
    error::CallError,
    telephony, twiml,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    extract::{FormOrJson, is_json, parse_body},
    models::{ControlDocumentParams, ErrorResponse, OutboundCallResponse},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::InternalServerError(message) => {
                error!("Internal Server Error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new(message)),
                )
                    .into_response()
            }
        }
    }
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Validation { .. } | CallError::InvalidHost(_) => {
                Self::BadRequest(err.to_string())
            }
            CallError::Telephony(message) => Self::InternalServerError(message),
        }
    }
}

fn request_host<'a>(state: &'a AppState, headers: &'a HeaderMap) -> Result<&'a str, ApiError> {
    let header = headers.get(HOST).and_then(|v| v.to_str().ok());
    state
        .public_host(header)
        .ok_or_else(|| ApiError::BadRequest("Missing Host header".to_string()))
}

/// Place an outbound call that streams its audio to a voice agent.
#[utoipa::path(
    post,
    path = "/outbound-call",
    request_body(
        content = CallRequest,
        content_type = "application/json",
        description = "Call details. A urlencoded form with the same fields is also accepted."
    ),
    responses(
        (status = 200, description = "Call created", body = OutboundCallResponse),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 500, description = "Twilio rejected the call", body = ErrorResponse)
    )
)]
pub async fn outbound_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<CallRequest>,
) -> Result<Json<OutboundCallResponse>, ApiError> {
    let host = request_host(&state, &headers)?;
    let call_sid = telephony::place_call(state.telephony.as_ref(), request, host).await?;

    Ok(Json(OutboundCallResponse {
        success: true,
        call_sid,
    }))
}

/// Serve the call-control document that connects the call to the media stream.
#[utoipa::path(
    get,
    path = "/outbound-call-twiml",
    params(ControlDocumentParams),
    responses(
        (status = 200, description = "TwiML call-control document", content_type = "text/xml", body = String),
        (status = 400, description = "Malformed body or missing Host", body = ErrorResponse)
    )
)]
pub async fn outbound_call_twiml(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Decoded like a form body so repeated or oddly encoded keys never reject the request.
    let from_query: ControlDocumentParams =
        parse_body(false, query.as_deref().unwrap_or_default().as_bytes())
            .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {e}")))?;
    let from_body = if method == Method::POST {
        parse_body::<ControlDocumentParams>(is_json(&headers), &body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    } else {
        ControlDocumentParams::default()
    };
    let params = from_body.resolve(from_query);
    let host = request_host(&state, &headers)?;

    info!(
        %method,
        prompt = %params.prompt,
        first_message = %params.first_message,
        eleven_labs_key = %redact(&params.eleven_labs_key),
        agent_id = %params.agent_id,
        "TwiML requested"
    );

    let document = twiml::build_control_document(&params, host);
    Ok(([(CONTENT_TYPE, "text/xml")], document))
}
