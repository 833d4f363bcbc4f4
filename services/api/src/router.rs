//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the media-stream WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{ControlDocumentParams, ErrorResponse, OutboundCallResponse},
    state::AppState,
    ws::media_stream_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use callbridge_core::call::{CONTROL_DOCUMENT_PATH, CallRequest, MEDIA_STREAM_PATH};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::outbound_call,
        handlers::outbound_call_twiml,
    ),
    components(
        schemas(CallRequest, OutboundCallResponse, ErrorResponse, ControlDocumentParams)
    ),
    tags(
        (name = "Call Bridge API", description = "Outbound calls bridged to a conversational voice agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/outbound-call", post(handlers::outbound_call))
        .route(
            CONTROL_DOCUMENT_PATH,
            get(handlers::outbound_call_twiml).post(handlers::outbound_call_twiml),
        )
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
