//! Manages the outbound WebSocket connection to the ElevenLabs Conversational AI agent.

use anyhow::{Context, Result};
use callbridge_core::{
    call::StreamParameters, convai::ClientMessage, signed_url::SignedUrlProvider,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{Instrument, debug, error, info, warn};

/// A request from the session loop to the agent connection task.
#[derive(Debug)]
pub enum AgentCommand {
    Send(ClientMessage),
    /// Close the socket, or abandon setup if it has not finished.
    Close,
}

/// A notification from the agent connection task to the session loop.
#[derive(Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// The handshake completed; the socket accepts messages.
    Connected,
    /// A text frame as received, not yet parsed.
    Frame(String),
    /// The signed URL fetch or the handshake failed.
    Failed,
    /// The agent closed the socket or it errored.
    Closed,
}

/// Handle to a running agent connection task.
pub struct AgentConnection {
    pub commands: mpsc::Sender<AgentCommand>,
    pub task: JoinHandle<()>,
}

/// Starts a task that fetches a signed URL for `params.agent_id`, opens the agent
/// socket and relays frames in both directions.
///
/// Events are reported on `events`. Dropping the returned command sender has the
/// same effect as sending [`AgentCommand::Close`].
pub fn start_agent_connection(
    signed_urls: Arc<dyn SignedUrlProvider>,
    params: StreamParameters,
    events: mpsc::Sender<AgentEvent>,
) -> AgentConnection {
    let (tx, rx) = mpsc::channel(128);
    let task = tokio::spawn(run(signed_urls, params, rx, events).in_current_span());
    AgentConnection { commands: tx, task }
}

type AgentSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(signed_urls: &dyn SignedUrlProvider, params: &StreamParameters) -> Result<AgentSocket> {
    let signed_url = signed_urls
        .fetch_signed_url(&params.eleven_labs_key, &params.agent_id)
        .await?;
    let (ws_stream, _) = connect_async(signed_url.as_str())
        .await
        .context("Failed to connect to ElevenLabs Conversational AI")?;
    Ok(ws_stream)
}

async fn run(
    signed_urls: Arc<dyn SignedUrlProvider>,
    params: StreamParameters,
    mut commands: mpsc::Receiver<AgentCommand>,
    events: mpsc::Sender<AgentEvent>,
) {
    let ws_stream = tokio::select! {
        result = connect(signed_urls.as_ref(), &params) => match result {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                error!(error = ?e, "[ElevenLabs] Setup error");
                let _ = events.send(AgentEvent::Failed).await;
                return;
            }
        },
        _ = commands.recv() => {
            info!("[ElevenLabs] Setup abandoned, media stream already closed");
            return;
        }
    };

    if events.send(AgentEvent::Connected).await.is_err() {
        return;
    }
    let (mut agent_tx, mut agent_rx) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(AgentCommand::Send(message)) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(error = %e, "[ElevenLabs] Failed to encode message");
                            continue;
                        }
                    };
                    if let Err(e) = agent_tx.send(WsMessage::Text(text.into())).await {
                        warn!(error = %e, "[ElevenLabs] Send failed");
                        let _ = events.send(AgentEvent::Closed).await;
                        return;
                    }
                }
                Some(AgentCommand::Close) | None => {
                    let _ = agent_tx.close().await;
                    return;
                }
            },
            frame = agent_rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(AgentEvent::Frame(text.to_string())).await.is_err() {
                        let _ = agent_tx.close().await;
                        return;
                    }
                }
                Some(Ok(WsMessage::Binary(_))) => debug!("[ElevenLabs] Ignoring binary frame"),
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "[ElevenLabs] Close frame received");
                    let _ = events.send(AgentEvent::Closed).await;
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "[ElevenLabs] WebSocket error");
                    let _ = events.send(AgentEvent::Closed).await;
                    return;
                }
                None => {
                    let _ = events.send(AgentEvent::Closed).await;
                    return;
                }
            },
        }
    }
}
