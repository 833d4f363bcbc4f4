//! API Models
//!
//! Request and response bodies for the REST routes, annotated for OpenAPI
//! generation with `utoipa`. The `POST /outbound-call` body is
//! [`callbridge_core::call::CallRequest`] itself.

use callbridge_core::call::StreamParameters;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Stream parameters accepted by `/outbound-call-twiml`, from the query string or body.
#[derive(Deserialize, ToSchema, IntoParams, Default, Debug)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ControlDocumentParams {
    pub prompt: Option<String>,
    pub first_message: Option<String>,
    pub eleven_labs_key: Option<String>,
    pub agent_id: Option<String>,
}

impl ControlDocumentParams {
    /// Combines body values with query values; a missing or empty body value
    /// falls back to the query string, and anything still missing becomes empty.
    pub fn resolve(self, fallback: ControlDocumentParams) -> StreamParameters {
        fn pick(primary: Option<String>, fallback: Option<String>) -> String {
            primary
                .filter(|v| !v.is_empty())
                .or(fallback)
                .unwrap_or_default()
        }

        StreamParameters {
            prompt: pick(self.prompt, fallback.prompt),
            first_message: pick(self.first_message, fallback.first_message),
            eleven_labs_key: pick(self.eleven_labs_key, fallback.eleven_labs_key),
            agent_id: pick(self.agent_id, fallback.agent_id),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallResponse {
    pub success: bool,
    #[schema(example = "CA0123456789abcdef0123456789abcdef")]
    pub call_sid: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_body_and_falls_back_to_query() {
        let body = ControlDocumentParams {
            prompt: Some("from body".into()),
            first_message: Some(String::new()),
            eleven_labs_key: None,
            agent_id: None,
        };
        let query = ControlDocumentParams {
            prompt: Some("from query".into()),
            first_message: Some("query greeting".into()),
            eleven_labs_key: Some("K1".into()),
            agent_id: None,
        };

        let params = body.resolve(query);
        assert_eq!(params.prompt, "from body");
        assert_eq!(params.first_message, "query greeting");
        assert_eq!(params.eleven_labs_key, "K1");
        assert_eq!(params.agent_id, "");
    }

    #[test]
    fn test_response_serialization() {
        let ok = OutboundCallResponse {
            success: true,
            call_sid: "CA1".into(),
        };
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"success":true,"callSid":"CA1"}"#
        );

        let err = ErrorResponse::new("Missing required parameters: number");
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"success":false,"error":"Missing required parameters: number"}"#
        );
    }
}
