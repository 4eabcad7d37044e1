use super::*;
use crate::routes::app;
use crate::state::test_helpers;
use canvas::doc::OperationKind;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let state = test_helpers::test_app_state();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.expect("server failed");
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/api/ws")).await.expect("ws connect");
    client
}

async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let msg = timeout(Duration::from_millis(500), client.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("ws error");
        if msg.is_text() {
            let text = msg.to_text().expect("text frame");
            return serde_json::from_str(text).expect("server message should parse");
        }
    }
}

async fn assert_nothing_pending(client: &mut Client) {
    assert!(
        timeout(Duration::from_millis(80), client.next()).await.is_err(),
        "expected no pending message"
    );
}

async fn send(client: &mut Client, value: serde_json::Value) {
    client.send(WsMessage::text(value.to_string())).await.expect("send");
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("tcp connect");
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.expect("write request");
    let mut response = String::new();
    timeout(Duration::from_millis(500), stream.read_to_string(&mut response))
        .await
        .expect("response timed out")
        .expect("read response");
    response
}

// =============================================================================
// PROTOCOL
// =============================================================================

#[tokio::test]
async fn stroke_round_trip_between_two_clients() {
    let addr = spawn_server().await;
    let mut a = connect(addr).await;
    let ServerMessage::Init { self_id: a_id, history, .. } = recv(&mut a).await else {
        panic!("expected init");
    };
    assert!(history.is_empty());

    let mut b = connect(addr).await;
    assert_eq!(recv(&mut b).await.name(), "init");
    assert_eq!(recv(&mut a).await.name(), "user_joined");

    send(&mut a, json!({"type": "draw_start", "x": 0, "y": 0, "color": "#FF0000", "width": 3, "tool": "brush"})).await;
    send(&mut a, json!({"type": "draw_move", "points": [{"x": 1, "y": 1}, {"x": 2, "y": 2}]})).await;
    send(&mut a, json!({"type": "draw_end"})).await;

    assert_eq!(recv(&mut b).await.name(), "remote_draw_start");
    assert_eq!(recv(&mut b).await.name(), "remote_draw_move");
    let ServerMessage::NewOperation { operation } = recv(&mut b).await else {
        panic!("expected new_operation");
    };
    assert_eq!(operation.author_id, a_id);
    assert_eq!(operation.kind(), OperationKind::Stroke);
    assert_eq!(operation.stroke().map(|s| s.points.len()), Some(3));

    assert_eq!(recv(&mut a).await, ServerMessage::NewOperation { operation: operation.clone() });

    send(&mut b, json!({"type": "undo"})).await;
    let undone = ServerMessage::OperationUndone { operation_id: operation.id };
    assert_eq!(recv(&mut a).await, undone);
    assert_eq!(recv(&mut b).await, undone);
}

#[tokio::test]
async fn invalid_messages_are_dropped_without_closing() {
    let addr = spawn_server().await;
    let mut a = connect(addr).await;
    assert_eq!(recv(&mut a).await.name(), "init");

    client_send_raw(&mut a, "not json").await;
    send(&mut a, json!({"type": "teleport"})).await;
    send(&mut a, json!({"type": "draw_start", "x": 0, "y": 0, "color": "red", "width": 3, "tool": "brush"})).await;
    send(&mut a, json!({"type": "draw_start", "x": 0, "y": 0, "color": "#FF0000", "width": 80, "tool": "brush"})).await;
    send(&mut a, json!({"type": "draw_move", "points": []})).await;
    send(&mut a, json!({"type": "draw_end"})).await;
    assert_nothing_pending(&mut a).await;

    send(&mut a, json!({"type": "sync_request"})).await;
    let ServerMessage::CanvasState { history, roster } = recv(&mut a).await else {
        panic!("expected canvas_state");
    };
    assert!(history.is_empty());
    assert_eq!(roster.len(), 1);
}

async fn client_send_raw(client: &mut Client, text: &str) {
    client.send(WsMessage::text(text.to_string())).await.expect("send");
}

#[tokio::test]
async fn disconnect_announces_user_left() {
    let addr = spawn_server().await;
    let mut a = connect(addr).await;
    assert_eq!(recv(&mut a).await.name(), "init");

    let mut b = connect(addr).await;
    let ServerMessage::Init { self_id: b_id, .. } = recv(&mut b).await else {
        panic!("expected init");
    };
    assert_eq!(recv(&mut a).await.name(), "user_joined");

    b.close(None).await.expect("close");
    assert_eq!(recv(&mut a).await, ServerMessage::UserLeft { participant_id: b_id });
}

// =============================================================================
// HTTP
// =============================================================================

#[tokio::test]
async fn healthz_and_stats_respond() {
    let addr = spawn_server().await;

    let health = http_get(addr, "/healthz").await;
    assert!(health.starts_with("HTTP/1.1 200"), "unexpected response: {health}");

    let mut a = connect(addr).await;
    assert_eq!(recv(&mut a).await.name(), "init");
    send(&mut a, json!({"type": "clear_canvas"})).await;
    assert_eq!(recv(&mut a).await.name(), "new_operation");

    let stats = http_get(addr, "/api/stats").await;
    assert!(stats.starts_with("HTTP/1.1 200"), "unexpected response: {stats}");
    let body = stats.split("\r\n\r\n").nth(1).expect("response body");
    let body: serde_json::Value = serde_json::from_str(body).expect("stats json");
    assert_eq!(body["participants"], 1);
    assert_eq!(body["history"]["total"], 1);
    assert_eq!(body["history"]["can_undo"], true);
}
