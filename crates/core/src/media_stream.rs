//! Twilio Media Streams protocol spoken on the inbound WebSocket.

use crate::call::StreamParameters;
use serde::{Deserialize, Serialize};

/// Events received from the telephony platform.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Sent once when the socket opens, before `start`.
    Connected,
    Start { start: StartMetadata },
    Media { media: InboundMedia },
    Stop,
    Mark,
    Dtmf,
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected => "connected",
            StreamEvent::Start { .. } => "start",
            StreamEvent::Media { .. } => "media",
            StreamEvent::Stop => "stop",
            StreamEvent::Mark => "mark",
            StreamEvent::Dtmf => "dtmf",
            StreamEvent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    pub stream_sid: String,
    pub call_sid: String,
    #[serde(default)]
    pub custom_parameters: StreamParameters,
}

#[derive(Debug, Deserialize)]
pub struct InboundMedia {
    /// Base64 encoded audio.
    pub payload: String,
}

/// Messages sent back to the telephony platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamCommand {
    /// Plays a chunk of base64 encoded audio on the call.
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Flushes audio the platform has buffered but not yet played.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}
