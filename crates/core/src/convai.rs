//! ElevenLabs Conversational AI protocol spoken on the outbound WebSocket.

use crate::call::StreamParameters;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages received from the conversational agent.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConversationInitiationMetadata {
        #[serde(default)]
        conversation_initiation_metadata_event: Option<InitiationMetadata>,
    },
    Audio {
        #[serde(default)]
        audio: Option<AudioChunk>,
        #[serde(default)]
        audio_event: Option<AudioEvent>,
    },
    Interruption,
    Ping {
        #[serde(default)]
        ping_event: Option<PingEvent>,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// The wire name of the message, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::ConversationInitiationMetadata { .. } => {
                "conversation_initiation_metadata"
            }
            ServerMessage::Audio { .. } => "audio",
            ServerMessage::Interruption => "interruption",
            ServerMessage::Ping { .. } => "ping",
            ServerMessage::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InitiationMetadata {
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Audio in the `audio.chunk` shape.
#[derive(Debug, Deserialize)]
pub struct AudioChunk {
    #[serde(default)]
    pub chunk: Option<String>,
}

/// Audio in the `audio_event.audio_base_64` shape.
#[derive(Debug, Deserialize)]
pub struct AudioEvent {
    #[serde(default)]
    pub audio_base_64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PingEvent {
    /// Echoed back untouched in the pong; the agent may send a string or a number.
    #[serde(default)]
    pub event_id: Option<Value>,
}

/// Picks the base64 audio out of either message shape, preferring `audio.chunk`.
pub fn audio_payload(
    audio: Option<AudioChunk>,
    audio_event: Option<AudioEvent>,
) -> Option<String> {
    audio
        .and_then(|a| a.chunk)
        .filter(|chunk| !chunk.is_empty())
        .or_else(|| {
            audio_event
                .and_then(|e| e.audio_base_64)
                .filter(|chunk| !chunk.is_empty())
        })
}

/// Messages sent to the conversational agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Typed(TypedClientMessage),
    UserAudioChunk { user_audio_chunk: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedClientMessage {
    ConversationInitiationClientData {
        conversation_config_override: ConversationConfigOverride,
    },
    Pong {
        event_id: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationConfigOverride {
    pub agent: AgentOverride,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOverride {
    pub prompt: PromptOverride,
    pub first_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptOverride {
    pub prompt: String,
}

impl ClientMessage {
    /// The first message on a new conversation: overrides the agent's prompt and greeting.
    pub fn initiation(params: &StreamParameters) -> Self {
        ClientMessage::Typed(TypedClientMessage::ConversationInitiationClientData {
            conversation_config_override: ConversationConfigOverride {
                agent: AgentOverride {
                    prompt: PromptOverride {
                        prompt: params.prompt.clone(),
                    },
                    first_message: params.first_message.clone(),
                },
            },
        })
    }

    pub fn pong(event_id: Value) -> Self {
        ClientMessage::Typed(TypedClientMessage::Pong { event_id })
    }

    pub fn user_audio(payload: String) -> Self {
        ClientMessage::UserAudioChunk {
            user_audio_chunk: payload,
        }
    }
}
