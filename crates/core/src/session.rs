//! Per-call relay state machine.
//!
//! [`CallSession`] owns the state of one telephony stream and its paired agent
//! conversation. It performs no I/O: every handler consumes an event from one of
//! the two sockets and returns the [`RelayAction`]s the runtime must carry out.
//! This keeps the forwarding rules independent of how the sockets are driven.

use crate::{
    call::StreamParameters,
    convai::{self, ClientMessage, ServerMessage},
    error::ProtocolError,
    media_stream::{OutboundMedia, StreamCommand, StreamEvent},
};
use tracing::{debug, info, warn};

/// Lifecycle of the telephony side of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStart,
    Streaming,
    Closed,
}

/// Lifecycle of the outbound agent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentLink {
    /// No connection has been requested yet.
    Idle,
    /// Signed URL fetch or socket handshake in progress.
    Connecting,
    Open,
    /// Setup failed; no audio will flow to or from the agent.
    Failed,
    Closed,
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayAction {
    /// Fetch a signed URL with these parameters and open the agent socket.
    ConnectAgent(StreamParameters),
    SendToAgent(ClientMessage),
    SendToTelephony(StreamCommand),
    /// Close the agent socket, or abandon it if it is still being set up.
    CloseAgent,
}

/// Frame counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames_to_agent: u64,
    pub frames_to_telephony: u64,
    pub dropped_inbound: u64,
    pub dropped_outbound: u64,
}

#[derive(Debug)]
pub struct CallSession {
    phase: Phase,
    agent: AgentLink,
    stream_sid: Option<String>,
    call_sid: Option<String>,
    parameters: Option<StreamParameters>,
    stats: RelayStats,
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CallSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingStart,
            agent: AgentLink::Idle,
            stream_sid: None,
            call_sid: None,
            parameters: None,
            stats: RelayStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn agent(&self) -> AgentLink {
        self.agent
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.call_sid.as_deref()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Parses and handles a text frame from the telephony socket.
    pub fn on_stream_frame(&mut self, text: &str) -> Result<Vec<RelayAction>, ProtocolError> {
        let event: StreamEvent = serde_json::from_str(text)?;
        Ok(self.on_stream_event(event))
    }

    pub fn on_stream_event(&mut self, event: StreamEvent) -> Vec<RelayAction> {
        debug!(event = event.name(), "[Twilio] Received event");

        if self.phase == Phase::Closed {
            debug!(event = event.name(), "[Twilio] Ignoring event after stream stopped");
            return Vec::new();
        }

        match event {
            StreamEvent::Start { start } => {
                if self.phase != Phase::AwaitingStart {
                    warn!(
                        stream_sid = %start.stream_sid,
                        "[Twilio] Duplicate start event ignored"
                    );
                    return Vec::new();
                }
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = %start.call_sid,
                    parameters = ?start.custom_parameters,
                    "[Twilio] Stream started"
                );
                self.stream_sid = Some(start.stream_sid);
                self.call_sid = Some(start.call_sid);
                self.parameters = Some(start.custom_parameters.clone());
                self.phase = Phase::Streaming;
                self.agent = AgentLink::Connecting;
                vec![RelayAction::ConnectAgent(start.custom_parameters)]
            }
            StreamEvent::Media { media } => {
                if self.phase == Phase::Streaming && self.agent == AgentLink::Open {
                    self.stats.frames_to_agent += 1;
                    vec![RelayAction::SendToAgent(ClientMessage::user_audio(
                        media.payload,
                    ))]
                } else {
                    self.stats.dropped_inbound += 1;
                    Vec::new()
                }
            }
            StreamEvent::Stop => {
                info!(stream_sid = ?self.stream_sid, "[Twilio] Stream ended");
                self.close()
            }
            other => {
                debug!(event = other.name(), "[Twilio] Unhandled event");
                Vec::new()
            }
        }
    }

    /// The telephony socket closed or failed.
    pub fn on_stream_closed(&mut self) -> Vec<RelayAction> {
        info!("[Twilio] Client disconnected");
        self.close()
    }

    /// The agent socket finished its handshake.
    pub fn on_agent_connected(&mut self) -> Vec<RelayAction> {
        if self.agent != AgentLink::Connecting {
            return Vec::new();
        }
        let Some(parameters) = self.parameters.as_ref() else {
            return Vec::new();
        };
        info!("[ElevenLabs] Connected to Conversational AI");
        debug!(prompt = %parameters.prompt, "[ElevenLabs] Sending initial config");
        self.agent = AgentLink::Open;
        vec![RelayAction::SendToAgent(ClientMessage::initiation(parameters))]
    }

    /// Signed URL fetch or handshake failed. The telephony side is left open.
    pub fn on_agent_failed(&mut self) {
        if self.agent == AgentLink::Connecting {
            self.agent = AgentLink::Failed;
        }
    }

    /// The agent socket closed or errored. This does not end the telephony stream.
    pub fn on_agent_closed(&mut self) {
        if matches!(self.agent, AgentLink::Open | AgentLink::Connecting) {
            info!("[ElevenLabs] Disconnected");
            self.agent = AgentLink::Closed;
        }
    }

    /// A caller audio frame emitted by [`Self::on_stream_event`] could not be handed
    /// to the agent connection and was discarded.
    pub fn on_agent_audio_dropped(&mut self) {
        self.stats.frames_to_agent = self.stats.frames_to_agent.saturating_sub(1);
        self.stats.dropped_inbound += 1;
    }

    /// Parses and handles a text frame from the agent socket.
    pub fn on_agent_frame(&mut self, text: &str) -> Result<Vec<RelayAction>, ProtocolError> {
        let message: ServerMessage = serde_json::from_str(text)?;
        Ok(self.on_agent_message(message))
    }

    pub fn on_agent_message(&mut self, message: ServerMessage) -> Vec<RelayAction> {
        if self.agent != AgentLink::Open {
            debug!(
                message = message.name(),
                "[ElevenLabs] Ignoring message on inactive connection"
            );
            return Vec::new();
        }

        match message {
            ServerMessage::ConversationInitiationMetadata {
                conversation_initiation_metadata_event,
            } => {
                let conversation_id =
                    conversation_initiation_metadata_event.and_then(|m| m.conversation_id);
                info!(?conversation_id, "[ElevenLabs] Received initiation metadata");
                Vec::new()
            }
            ServerMessage::Audio { audio, audio_event } => {
                let Some(stream_sid) = self.stream_sid.clone() else {
                    debug!("[ElevenLabs] Received audio but no StreamSid yet");
                    self.stats.dropped_outbound += 1;
                    return Vec::new();
                };
                match convai::audio_payload(audio, audio_event) {
                    Some(payload) => {
                        self.stats.frames_to_telephony += 1;
                        vec![RelayAction::SendToTelephony(StreamCommand::Media {
                            stream_sid,
                            media: OutboundMedia { payload },
                        })]
                    }
                    None => {
                        debug!("[ElevenLabs] Audio message without payload");
                        self.stats.dropped_outbound += 1;
                        Vec::new()
                    }
                }
            }
            ServerMessage::Interruption => match self.stream_sid.clone() {
                Some(stream_sid) => {
                    debug!("[ElevenLabs] Interruption, clearing buffered audio");
                    vec![RelayAction::SendToTelephony(StreamCommand::Clear {
                        stream_sid,
                    })]
                }
                None => Vec::new(),
            },
            ServerMessage::Ping { ping_event } => {
                match ping_event.and_then(|p| p.event_id).filter(|id| !id.is_null()) {
                    Some(event_id) => vec![RelayAction::SendToAgent(ClientMessage::pong(event_id))],
                    None => {
                        debug!("[ElevenLabs] Ping without event id");
                        Vec::new()
                    }
                }
            }
            ServerMessage::Unknown => {
                debug!("[ElevenLabs] Unhandled message type");
                Vec::new()
            }
        }
    }

    fn close(&mut self) -> Vec<RelayAction> {
        self.phase = Phase::Closed;
        match self.agent {
            AgentLink::Open | AgentLink::Connecting => {
                self.agent = AgentLink::Closed;
                vec![RelayAction::CloseAgent]
            }
            _ => Vec::new(),
        }
    }
}
