//! End-to-end tests for the streaming session over real WebSockets
//!
//! Each test starts a scripted server on an ephemeral localhost port with
//! `tokio_tungstenite::accept_async`, points a `WebSocketConnector` at it and
//! feeds the resulting channel events to a `StreamingSession`, the same way
//! the terminal client does.

use std::future::Future;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use webserve_core::{
    ChannelEvent, ChannelEventKind, ExchangeState, NoticeLevel, RecordingRenderer, ServerUpdate,
    SessionMetadata, StreamingSession, TransportConfig, Turn, WebSocketConnector,
    DEFAULT_ENDPOINT_PATH, NORMAL_CLOSURE,
};

type Session = StreamingSession<RecordingRenderer, WebSocketConnector>;
type ServerStream = WebSocketStream<TcpStream>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Accept one WebSocket connection and hand it to `handler`
async fn spawn_server<F, Fut, T>(handler: F) -> (String, JoinHandle<T>)
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await
    });
    (format!("ws://{addr}{DEFAULT_ENDPOINT_PATH}"), handle)
}

fn session_for(url: &str) -> (Session, mpsc::Receiver<ChannelEvent>) {
    let config = TransportConfig {
        url: url.to_string(),
        connect_timeout_ms: 2000,
    };
    let (connector, events) = WebSocketConnector::with_event_channel(config);
    let session = StreamingSession::new(
        RecordingRenderer::new(),
        connector,
        SessionMetadata::new("Qwen/Qwen2.5-7B-Instruct", Some(0.6)),
    );
    (session, events)
}

async fn next_event(events: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a channel event")
        .expect("event channel closed")
}

/// Feed events to the session until it is idle again
async fn drive_to_idle(session: &mut Session, events: &mut mpsc::Receiver<ChannelEvent>) {
    while session.state().is_busy() {
        let event = next_event(events).await;
        session.handle_channel_event(event);
    }
}

/// Feed events until one server update has been applied
async fn drive_until_message(session: &mut Session, events: &mut mpsc::Receiver<ChannelEvent>) {
    loop {
        let event = next_event(events).await;
        let is_message = matches!(event.kind, ChannelEventKind::Message(_));
        session.handle_channel_event(event);
        if is_message {
            return;
        }
    }
}

async fn read_transcript(ws: &mut ServerStream) -> Vec<Turn> {
    while let Some(frame) = ws.next().await {
        if let Message::Text(text) = frame.unwrap() {
            return serde_json::from_str(&text).unwrap();
        }
    }
    panic!("client never sent a transcript");
}

async fn send_update(ws: &mut ServerStream, update: ServerUpdate) {
    ws.send(Message::Text(update.to_json().unwrap()))
        .await
        .unwrap();
}

/// Read until the client closes, returning its close code
async fn wait_for_close(ws: &mut ServerStream) -> Option<u16> {
    let mut code = None;
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Close(Some(frame))) => code = Some(u16::from(frame.code)),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    code
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_hello_exchange_over_websocket() {
    let (url, server) = spawn_server(|mut ws| async move {
        let transcript = read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::output("Hi")).await;
        send_update(&mut ws, ServerUpdate::completed("Hi there")).await;
        let code = wait_for_close(&mut ws).await;
        (transcript, code)
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    session.start("hello").unwrap();
    drive_to_idle(&mut session, &mut events).await;

    let (transcript, close_code) = server.await.unwrap();
    assert_eq!(transcript, vec![Turn::user("hello")]);
    assert_eq!(close_code, Some(NORMAL_CLOSURE));

    assert_eq!(session.state(), ExchangeState::Idle);
    assert_eq!(
        session.history().turns(),
        &[Turn::user("hello"), Turn::assistant("Hi there")]
    );
    let element = session.renderer().last_element().unwrap();
    assert_eq!(element.revisions, vec!["Hi", "Hi there"]);
    assert!(session.renderer().controls.export);
    assert!(session.renderer().controls.clear);
    assert!(!session.renderer().controls.stop);
}

#[tokio::test]
async fn test_second_exchange_sends_whole_conversation() {
    let (url, first) = spawn_server(|mut ws| async move {
        read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::completed("4")).await;
        wait_for_close(&mut ws).await;
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    session.start("2+2?").unwrap();
    drive_to_idle(&mut session, &mut events).await;
    first.await.unwrap();

    // A fresh server on a new port; point the connector at it
    let (url, second) = spawn_server(|mut ws| async move {
        let transcript = read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::completed("5")).await;
        wait_for_close(&mut ws).await;
        transcript
    })
    .await;
    let config = TransportConfig {
        url,
        connect_timeout_ms: 2000,
    };
    let (connector, mut events) = WebSocketConnector::with_event_channel(config);
    *session.connector_mut() = connector;

    session.start("and 2+3?").unwrap();
    drive_to_idle(&mut session, &mut events).await;

    let transcript = second.await.unwrap();
    assert_eq!(
        transcript,
        vec![
            Turn::user("2+2?"),
            Turn::assistant("4"),
            Turn::user("and 2+3?"),
        ]
    );
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn test_stop_waits_for_next_update() {
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let (url, server) = spawn_server(|mut ws| async move {
        read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::output("Once")).await;
        release_rx.await.unwrap();
        send_update(&mut ws, ServerUpdate::output("Once upon")).await;
        wait_for_close(&mut ws).await
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    session.start("tell me a story").unwrap();
    drive_until_message(&mut session, &mut events).await;

    assert!(session.request_stop());
    assert_eq!(session.state(), ExchangeState::StopRequested);
    release_tx.send(()).unwrap();

    drive_to_idle(&mut session, &mut events).await;

    assert_eq!(server.await.unwrap(), Some(NORMAL_CLOSURE));
    assert_eq!(
        session.history().last(),
        Some(&Turn::assistant("Once upon"))
    );
}

#[tokio::test]
async fn test_stop_deadline_closes_silent_server() {
    let (url, server) = spawn_server(|mut ws| async move {
        read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::output("Partial")).await;
        // Never sends anything else
        wait_for_close(&mut ws).await
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    let exchange = session.start("hello").unwrap();
    drive_until_message(&mut session, &mut events).await;

    session.request_stop();
    assert!(session.stop_deadline_elapsed(exchange));
    drive_to_idle(&mut session, &mut events).await;

    assert_eq!(server.await.unwrap(), Some(NORMAL_CLOSURE));
    assert_eq!(session.history().last(), Some(&Turn::assistant("Partial")));
}

#[tokio::test]
async fn test_stop_deadline_recovers_from_hung_server() {
    let (hold_tx, hold_rx) = oneshot::channel::<()>();
    let (url, server) = spawn_server(|mut ws| async move {
        read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::output("Partial")).await;
        // Hold the socket open without reading, so no close reply is sent
        let _ = hold_rx.await;
        drop(ws);
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    let exchange = session.start("hello").unwrap();
    drive_until_message(&mut session, &mut events).await;

    session.request_stop();
    assert!(session.stop_deadline_elapsed(exchange));
    drive_to_idle(&mut session, &mut events).await;

    assert_eq!(session.state(), ExchangeState::Idle);
    assert_eq!(
        session.history().turns(),
        &[Turn::user("hello"), Turn::assistant("Partial")]
    );
    assert!(!session.renderer().controls.stop);

    hold_tx.send(()).unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_shown_inline() {
    let (url, server) = spawn_server(|mut ws| async move {
        read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::error("model overloaded")).await;
        send_update(&mut ws, ServerUpdate::completed("")).await;
        wait_for_close(&mut ws).await
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    session.start("hello").unwrap();
    drive_to_idle(&mut session, &mut events).await;
    server.await.unwrap();

    let element = session.renderer().last_element().unwrap();
    assert_eq!(element.text, "model overloaded");
    assert!(element.is_error);
    assert_eq!(session.history().last(), Some(&Turn::assistant("")));
}

#[tokio::test]
async fn test_dropped_connection_keeps_partial_output() {
    let (url, server) = spawn_server(|mut ws| async move {
        read_transcript(&mut ws).await;
        send_update(&mut ws, ServerUpdate::output("Hi th")).await;
        ws.flush().await.unwrap();
        // Drop the socket without a closing handshake
    })
    .await;

    let (mut session, mut events) = session_for(&url);
    session.start("hello").unwrap();
    drive_to_idle(&mut session, &mut events).await;
    server.await.unwrap();

    assert_eq!(session.state(), ExchangeState::Idle);
    assert_eq!(
        session.history().turns(),
        &[Turn::user("hello"), Turn::assistant("Hi th")]
    );
    assert!(!session.renderer().controls.stop);
}

#[tokio::test]
async fn test_unreachable_server_returns_to_idle() {
    // Reserve a port, then free it so nothing listens there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (mut session, mut events) = session_for(&format!("ws://{addr}{DEFAULT_ENDPOINT_PATH}"));
    session.start("hello").unwrap();
    drive_to_idle(&mut session, &mut events).await;

    assert_eq!(session.state(), ExchangeState::Idle);
    assert_eq!(session.history().turns(), &[Turn::user("hello")]);
    assert!(session.renderer().elements.is_empty());
    let notices = &session.renderer().notices;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, NoticeLevel::Error);
}
