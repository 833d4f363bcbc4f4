//! Outbound call requests and the parameters that travel with a call.

use crate::error::CallError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Path of the call-control endpoint the telephony platform fetches once the call connects.
pub const CONTROL_DOCUMENT_PATH: &str = "/outbound-call-twiml";

/// Path of the WebSocket endpoint the telephony platform streams call audio to.
pub const MEDIA_STREAM_PATH: &str = "/outbound-media-stream";

/// Shortens a secret to a recognisable prefix so it can appear in logs.
pub fn redact(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        return "***".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}***")
}

/// Values attached to the media-stream directive and echoed back by the
/// telephony platform when the stream starts.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamParameters {
    pub prompt: String,
    pub first_message: String,
    pub eleven_labs_key: String,
    pub agent_id: String,
}

impl StreamParameters {
    /// The parameters as `(wire name, value)` pairs, in document order.
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("prompt", self.prompt.as_str()),
            ("firstMessage", self.first_message.as_str()),
            ("elevenLabsKey", self.eleven_labs_key.as_str()),
            ("agentId", self.agent_id.as_str()),
        ]
    }
}

impl fmt::Debug for StreamParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamParameters")
            .field("prompt", &self.prompt)
            .field("first_message", &self.first_message)
            .field("eleven_labs_key", &redact(&self.eleven_labs_key))
            .field("agent_id", &self.agent_id)
            .finish()
    }
}

/// Account credentials for the telephony platform, supplied per request.
#[derive(Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redact(&self.auth_token))
            .finish()
    }
}

/// A request to place an outbound call, as received from an API caller.
///
/// Every field is optional at this stage so that a missing field is reported
/// through [`CallRequest::validate`] rather than as a decoding failure.
#[derive(Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Destination number in E.164 form.
    #[cfg_attr(feature = "openapi", schema(example = "+15551230000"))]
    pub number: Option<String>,
    /// System prompt for the voice agent.
    pub prompt: Option<String>,
    /// First sentence the agent says when the call connects.
    pub first_message: Option<String>,
    pub eleven_labs_key: Option<String>,
    pub agent_id: Option<String>,
    #[cfg_attr(feature = "openapi", schema(example = "AC0123456789abcdef0123456789abcdef"))]
    pub twilio_sid: Option<String>,
    pub twilio_token: Option<String>,
    #[cfg_attr(feature = "openapi", schema(example = "+15559870000"))]
    pub from_number: Option<String>,
}

/// A call request whose eight fields are all present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCall {
    pub to: String,
    pub from: String,
    pub credentials: TwilioCredentials,
    pub stream: StreamParameters,
}

impl CallRequest {
    /// Checks that every field is present and non-empty.
    pub fn validate(self) -> Result<ValidatedCall, CallError> {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, name: &'static str| match value {
            Some(value) if !value.is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let to = require(self.number, "number");
        let prompt = require(self.prompt, "prompt");
        let first_message = require(self.first_message, "firstMessage");
        let eleven_labs_key = require(self.eleven_labs_key, "elevenLabsKey");
        let agent_id = require(self.agent_id, "agentId");
        let account_sid = require(self.twilio_sid, "twilioSid");
        let auth_token = require(self.twilio_token, "twilioToken");
        let from = require(self.from_number, "fromNumber");

        if !missing.is_empty() {
            return Err(CallError::Validation { missing });
        }

        Ok(ValidatedCall {
            to,
            from,
            credentials: TwilioCredentials {
                account_sid,
                auth_token,
            },
            stream: StreamParameters {
                prompt,
                first_message,
                eleven_labs_key,
                agent_id,
            },
        })
    }
}

/// Builds the URL the telephony platform fetches the call-control document from,
/// carrying the stream parameters in its query string.
pub fn callback_url(host: &str, params: &StreamParameters) -> Result<Url, CallError> {
    Url::parse_with_params(
        &format!("https://{host}{CONTROL_DOCUMENT_PATH}"),
        params.pairs(),
    )
    .map_err(|e| CallError::InvalidHost(format!("{host}: {e}")))
}
