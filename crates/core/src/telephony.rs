//! Call placement on the Twilio REST API.

use crate::{
    call::{CallRequest, TwilioCredentials, callback_url},
    error::CallError,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

/// A fully specified outbound call, ready to hand to the telephony platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub credentials: TwilioCredentials,
    pub to: String,
    pub from: String,
    /// Where the platform fetches the call-control document once the call connects.
    pub callback_url: String,
}

/// A telephony platform able to place outbound calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// Places the call and returns the platform-assigned call identifier.
    async fn create_call(&self, call: OutboundCall) -> Result<String, CallError>;
}

/// Validates `request` and places the call, pointing the platform back at `host`.
///
/// No platform call is attempted unless every request field is present.
pub async fn place_call(
    telephony: &dyn TelephonyClient,
    request: CallRequest,
    host: &str,
) -> Result<String, CallError> {
    let call = request.validate()?;
    let callback = callback_url(host, &call.stream)?;

    info!(to = %call.to, from = %call.from, "Placing outbound call");
    let call_sid = telephony
        .create_call(OutboundCall {
            credentials: call.credentials,
            to: call.to,
            from: call.from,
            callback_url: callback.into(),
        })
        .await
        .inspect_err(|e| error!(error = %e, "Error initiating call"))?;

    info!(%call_sid, "Outbound call created");
    Ok(call_sid)
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

/// `TelephonyClient` backed by the Twilio `Calls` resource. Credentials travel with
/// each call, so one client serves every account.
pub struct TwilioClient {
    http: reqwest::Client,
    api_base: String,
}

impl TwilioClient {
    pub const DEFAULT_API_BASE: &'static str = "https://api.twilio.com";

    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    fn calls_endpoint(&self, account_sid: &str) -> Result<Url, CallError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| CallError::Telephony(format!("invalid Twilio API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CallError::Telephony("invalid Twilio API base".to_string()))?
            .pop_if_empty()
            .extend(["2010-04-01", "Accounts", account_sid, "Calls.json"]);
        Ok(url)
    }
}

#[async_trait]
impl TelephonyClient for TwilioClient {
    async fn create_call(&self, call: OutboundCall) -> Result<String, CallError> {
        let endpoint = self.calls_endpoint(&call.credentials.account_sid)?;
        let response = self
            .http
            .post(endpoint)
            .basic_auth(
                &call.credentials.account_sid,
                Some(&call.credentials.auth_token),
            )
            .form(&[
                ("To", call.to.as_str()),
                ("From", call.from.as_str()),
                ("Url", call.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CallError::Telephony(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let fallback = status
                .canonical_reason()
                .unwrap_or("Failed to initiate call")
                .to_string();
            let message = response
                .json::<TwilioErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or(fallback);
            return Err(CallError::Telephony(message));
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| CallError::Telephony(format!("unexpected call resource: {e}")))?;
        Ok(resource.sid)
    }
}
