//! End-to-end relay tests: a real server between a Twilio-like client and a fake
//! conversational agent reached through a mocked signed-URL endpoint.

use callbridge_api::{config::Config, router::create_router, state::AppState};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::{accept_async, connect_async, tungstenite::protocol::Message as WsMessage};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

const SIGNED_URL_PATH: &str = "/v1/convai/conversation/get_signed_url";
const WAIT: Duration = Duration::from_secs(5);

const START: &str = r#"{
    "event": "start",
    "sequenceNumber": "1",
    "start": {
        "streamSid": "SS1",
        "callSid": "CA1",
        "accountSid": "AC123",
        "tracks": ["inbound"],
        "customParameters": {
            "prompt": "You sell solar panels",
            "firstMessage": "Hi, is this a good time?",
            "elevenLabsKey": "K1",
            "agentId": "A1"
        }
    },
    "streamSid": "SS1"
}"#;

fn media(payload: &str) -> String {
    json!({"event": "media", "streamSid": "SS1", "media": {"track": "inbound", "payload": payload}})
        .to_string()
}

/// A single-connection agent endpoint. Frames it receives are forwarded to the
/// test; `None` marks the connection closing.
struct FakeAgent {
    url: String,
    received: mpsc::Receiver<Option<String>>,
    outgoing: mpsc::Sender<String>,
}

impl FakeAgent {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/convai", listener.local_addr().unwrap());
        let (in_tx, in_rx) = mpsc::channel(64);
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (mut tx, mut rx) = ws.split();
            loop {
                tokio::select! {
                    Some(text) = out_rx.recv() => {
                        tx.send(WsMessage::Text(text.into())).await.unwrap();
                    }
                    frame = rx.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let _ = in_tx.send(Some(text.to_string())).await;
                        }
                        Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => {
                            let _ = in_tx.send(None).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        });

        Self {
            url,
            received: in_rx,
            outgoing: out_tx,
        }
    }

    async fn recv_json(&mut self) -> Value {
        let frame = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("agent frame within timeout")
            .expect("agent task alive")
            .expect("agent connection still open");
        serde_json::from_str(&frame).unwrap()
    }

    async fn send(&self, value: Value) {
        self.outgoing.send(value.to_string()).await.unwrap();
    }

    async fn send_raw(&self, text: &str) {
        self.outgoing.send(text.to_string()).await.unwrap();
    }
}

async fn start_server(elevenlabs_api_base: String) -> String {
    let state = Arc::new(AppState::from_config(Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        log_level: tracing::Level::INFO,
        public_host: None,
        elevenlabs_api_base,
        twilio_api_base: "http://127.0.0.1:9".to_string(),
    }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("ws://{addr}/outbound-media-stream")
}

async fn mock_signed_url(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SIGNED_URL_PATH))
        .and(query_param("agent_id", "A1"))
        .and(header("xi-api-key", "K1"))
        .respond_with(response)
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn next_text<S>(stream: &mut S) -> Value
where
    S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(WAIT, stream.next())
            .await
            .expect("telephony frame within timeout")
            .expect("telephony socket open")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn relays_audio_both_ways_and_closes_agent_on_hangup() {
    let mut agent = FakeAgent::start().await;
    let signed_urls =
        mock_signed_url(ResponseTemplate::new(200).set_body_json(json!({"signed_url": &agent.url})))
            .await;
    let bridge_url = start_server(signed_urls.uri()).await;

    let (twilio, _) = connect_async(bridge_url.as_str()).await.unwrap();
    let (mut twilio_tx, mut twilio_rx) = twilio.split();

    twilio_tx
        .send(WsMessage::Text(r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#.into()))
        .await
        .unwrap();
    twilio_tx.send(WsMessage::Text(START.into())).await.unwrap();

    // The conversation overrides go out before any audio.
    let init = agent.recv_json().await;
    assert_eq!(init["type"], "conversation_initiation_client_data");
    assert_eq!(
        init["conversation_config_override"]["agent"]["prompt"]["prompt"],
        "You sell solar panels"
    );
    assert_eq!(
        init["conversation_config_override"]["agent"]["first_message"],
        "Hi, is this a good time?"
    );

    twilio_tx.send(WsMessage::Text(media("QUJD").into())).await.unwrap();
    assert_eq!(agent.recv_json().await, json!({"user_audio_chunk": "QUJD"}));

    agent
        .send(json!({"type": "audio", "audio_event": {"audio_base_64": "WFla", "event_id": 1}}))
        .await;
    assert_eq!(
        next_text(&mut twilio_rx).await,
        json!({"event": "media", "streamSid": "SS1", "media": {"payload": "WFla"}})
    );

    agent
        .send(json!({"type": "ping", "ping_event": {"event_id": 42, "ping_ms": 50}}))
        .await;
    assert_eq!(agent.recv_json().await, json!({"type": "pong", "event_id": 42}));

    // Malformed frames on either side are skipped.
    twilio_tx.send(WsMessage::Text("not json".into())).await.unwrap();
    twilio_tx.send(WsMessage::Text(media("REVG").into())).await.unwrap();
    assert_eq!(agent.recv_json().await, json!({"user_audio_chunk": "REVG"}));

    agent.send_raw("{\"type\":").await;
    agent
        .send(json!({"type": "interruption", "interruption_event": {"event_id": 3}}))
        .await;
    assert_eq!(
        next_text(&mut twilio_rx).await,
        json!({"event": "clear", "streamSid": "SS1"})
    );

    twilio_tx.send(WsMessage::Close(None)).await.unwrap();
    let closed = tokio::time::timeout(WAIT, agent.received.recv())
        .await
        .expect("agent closed within timeout");
    assert_eq!(closed, Some(None));
}

#[tokio::test]
async fn signed_url_failure_leaves_media_stream_open() {
    let signed_urls = mock_signed_url(ResponseTemplate::new(401)).await;
    let bridge_url = start_server(signed_urls.uri()).await;

    let (twilio, _) = connect_async(bridge_url.as_str()).await.unwrap();
    let (mut twilio_tx, mut twilio_rx) = twilio.split();

    twilio_tx.send(WsMessage::Text(START.into())).await.unwrap();
    twilio_tx.send(WsMessage::Text(media("QUJD").into())).await.unwrap();

    let nothing = tokio::time::timeout(Duration::from_millis(300), twilio_rx.next()).await;
    assert!(nothing.is_err(), "media stream should stay open and silent");

    // The socket is still usable after the failed setup.
    twilio_tx.send(WsMessage::Text(media("REVG").into())).await.unwrap();
    twilio_tx
        .send(WsMessage::Text(r#"{"event":"stop","streamSid":"SS1"}"#.into()))
        .await
        .unwrap();
}

/// Agent endpoint that streams `frames` audio messages while reading everything
/// sent to it. Resolves the returned receiver when the bridge closes the socket.
async fn start_flooding_agent(frames: usize) -> (String, tokio::sync::oneshot::Receiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/convai", listener.local_addr().unwrap());
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();

        tokio::spawn(async move {
            let audio = json!({"type": "audio", "audio_event": {"audio_base_64": "WFla"}}).to_string();
            for _ in 0..frames {
                if tx.send(WsMessage::Text(audio.clone().into())).await.is_err() {
                    break;
                }
            }
        });

        let mut received = 0;
        while let Some(Ok(frame)) = rx.next().await {
            match frame {
                WsMessage::Text(_) => received += 1,
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
        let _ = closed_tx.send(received);
    });

    (url, closed_rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hangup_closes_agent_under_sustained_two_way_audio() {
    const FRAMES: usize = 20_000;

    let (agent_url, agent_closed) = start_flooding_agent(FRAMES).await;
    let signed_urls =
        mock_signed_url(ResponseTemplate::new(200).set_body_json(json!({"signed_url": agent_url})))
            .await;
    let bridge_url = start_server(signed_urls.uri()).await;

    let (twilio, _) = connect_async(bridge_url.as_str()).await.unwrap();
    let (mut twilio_tx, mut twilio_rx) = twilio.split();

    let reader = tokio::spawn(async move {
        let mut played = 0usize;
        while let Some(Ok(frame)) = twilio_rx.next().await {
            if let WsMessage::Text(_) = frame {
                played += 1;
            }
        }
        played
    });

    twilio_tx.send(WsMessage::Text(START.into())).await.unwrap();
    let frame = media("QUJD");
    for _ in 0..FRAMES {
        twilio_tx.send(WsMessage::Text(frame.clone().into())).await.unwrap();
    }
    twilio_tx
        .send(WsMessage::Text(r#"{"event":"stop","streamSid":"SS1"}"#.into()))
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(30), agent_closed)
        .await
        .expect("agent socket closed after stop")
        .unwrap();
    assert!(received > 0, "agent saw caller audio before the stop");

    twilio_tx.send(WsMessage::Close(None)).await.unwrap();
    let played = tokio::time::timeout(WAIT, reader)
        .await
        .expect("media stream closed after hangup")
        .unwrap();
    assert!(played > 0, "caller heard agent audio");
}
