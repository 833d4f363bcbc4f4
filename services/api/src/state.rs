//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the immutable
//! configuration and the REST clients shared by every request and call session.

use crate::config::Config;
use callbridge_core::{
    signed_url::{ElevenLabsClient, SignedUrlProvider},
    telephony::{TelephonyClient, TwilioClient},
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// Nothing in here is mutated after startup; per-call state lives in each session task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub telephony: Arc<dyn TelephonyClient>,
    pub signed_urls: Arc<dyn SignedUrlProvider>,
}

impl AppState {
    /// Builds the state with the Twilio and ElevenLabs clients the config points at.
    pub fn from_config(config: Config) -> Self {
        Self {
            telephony: Arc::new(TwilioClient::new(config.twilio_api_base.clone())),
            signed_urls: Arc::new(ElevenLabsClient::new(config.elevenlabs_api_base.clone())),
            config: Arc::new(config),
        }
    }

    /// The host to advertise in callback and stream URLs: the configured public
    /// host if any, otherwise the one the request arrived on.
    pub fn public_host<'a>(&'a self, request_host: Option<&'a str>) -> Option<&'a str> {
        self.config
            .public_host
            .as_deref()
            .or(request_host)
            .filter(|h| !h.is_empty())
    }
}
