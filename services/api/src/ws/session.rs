//! Manages the Twilio media-stream WebSocket for one call.

use super::provider::{self, AgentCommand, AgentConnection, AgentEvent};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use callbridge_core::{
    convai::ClientMessage,
    media_stream::StreamCommand,
    session::{CallSession, RelayAction},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, instrument, warn};

/// Axum handler to upgrade the media-stream request to a WebSocket.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Relays one call between the Twilio socket and the agent connection.
///
/// The loop owns the [`CallSession`] and the Twilio sink. The agent socket is
/// driven by its own task, started when the stream's `start` event arrives.
#[instrument(name = "media_stream", skip_all, fields(connection_id, stream_sid, call_sid))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("[Server] Twilio connected to outbound media stream");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<AgentEvent>(128);
    let mut session = CallSession::new();
    let mut agent: Option<AgentConnection> = None;

    loop {
        let mut inbound_open = true;
        let actions = tokio::select! {
            frame = socket_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => session
                    .on_stream_frame(text.as_str())
                    .unwrap_or_else(|e| {
                        error!(error = %e, "[Twilio] Error processing message");
                        Vec::new()
                    }),
                Some(Ok(Message::Binary(_))) => {
                    debug!("[Twilio] Ignoring binary frame");
                    Vec::new()
                }
                Some(Ok(Message::Close(_))) | None => {
                    inbound_open = false;
                    session.on_stream_closed()
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    warn!(error = %e, "[Twilio] WebSocket error");
                    inbound_open = false;
                    session.on_stream_closed()
                }
            },
            Some(event) = events_rx.recv() => match event {
                AgentEvent::Connected => session.on_agent_connected(),
                AgentEvent::Frame(text) => session.on_agent_frame(&text).unwrap_or_else(|e| {
                    error!(error = %e, "[ElevenLabs] Error processing message");
                    Vec::new()
                }),
                AgentEvent::Failed => {
                    session.on_agent_failed();
                    Vec::new()
                }
                AgentEvent::Closed => {
                    session.on_agent_closed();
                    Vec::new()
                }
            },
        };

        for action in actions {
            if let Err(e) = apply_action(action, &state, &mut session, &mut socket_tx, &mut agent, &events_tx).await {
                warn!(error = %e, "[Twilio] Failed to send to media stream");
            }
        }

        if !inbound_open {
            break;
        }
    }

    let stats = session.stats();
    info!(
        frames_to_agent = stats.frames_to_agent,
        frames_to_telephony = stats.frames_to_telephony,
        dropped_inbound = stats.dropped_inbound,
        dropped_outbound = stats.dropped_outbound,
        "[Server] Media stream session finished"
    );
}

/// Carries out one action. Nothing here waits on the agent task, so a slow agent
/// connection never stops the Twilio socket from being read.
async fn apply_action(
    action: RelayAction,
    state: &AppState,
    session: &mut CallSession,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    agent: &mut Option<AgentConnection>,
    events_tx: &mpsc::Sender<AgentEvent>,
) -> Result<()> {
    match action {
        RelayAction::ConnectAgent(params) => {
            let span = tracing::Span::current();
            if let Some(stream_sid) = session.stream_sid() {
                span.record("stream_sid", stream_sid);
            }
            if let Some(call_sid) = session.call_sid() {
                span.record("call_sid", call_sid);
            }
            *agent = Some(provider::start_agent_connection(
                state.signed_urls.clone(),
                params,
                events_tx.clone(),
            ));
        }
        RelayAction::SendToAgent(message) => {
            let Some(conn) = agent.as_ref() else {
                return Ok(());
            };
            let audio = matches!(message, ClientMessage::UserAudioChunk { .. });
            if let Err(e) = conn.commands.try_send(AgentCommand::Send(message)) {
                let backed_up = matches!(e, TrySendError::Full(_));
                debug!(backed_up, "[ElevenLabs] Dropping message, connection not accepting");
                if audio {
                    session.on_agent_audio_dropped();
                }
            }
        }
        RelayAction::SendToTelephony(command) => send_command(socket_tx, &command).await?,
        RelayAction::CloseAgent => {
            // Dropping the sender closes the connection even when the queue is full.
            if let Some(conn) = agent.take() {
                let _ = conn.commands.try_send(AgentCommand::Close);
            }
        }
    }
    Ok(())
}

/// Serializes a command and sends it over the Twilio socket.
async fn send_command(
    sink: &mut SplitSink<WebSocket, Message>,
    command: &StreamCommand,
) -> Result<()> {
    let text = serde_json::to_string(command)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}
