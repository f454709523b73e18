//! End-to-end integration tests using a real WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use multiview_server::config::ServerConfig;
use multiview_server::server::CoordinatorServer;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a test server and return its address + the server.
async fn boot_server(config: ServerConfig) -> (SocketAddr, Arc<CoordinatorServer>) {
    let server = Arc::new(CoordinatorServer::new(config, None));
    let (addr, _handle) = server.listen().await.unwrap();
    (addr, server)
}

async fn boot_default() -> (SocketAddr, Arc<CoordinatorServer>) {
    boot_server(ServerConfig::default()).await // port 0 = auto-assign
}

fn ws_url(addr: SocketAddr, session: &str, id: &str) -> String {
    format!("ws://{addr}/sessions/{session}/ws?id={id}")
}

async fn join(addr: SocketAddr, session: &str, id: &str) -> WsStream {
    let (ws, _) = connect_async(ws_url(addr, session, id)).await.unwrap();
    ws
}

/// Next text frame, skipping control frames.
async fn read_text(ws: &mut WsStream) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn read_json(ws: &mut WsStream) -> Value {
    serde_json::from_str(&read_text(ws).await).unwrap()
}

/// Next close frame, skipping everything else.
async fn read_close(ws: &mut WsStream) -> Option<CloseFrame> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Close(frame) = msg {
            return frame;
        }
    }
}

/// Assert no text frame arrives for a short while.
async fn assert_silent(ws: &mut WsStream) {
    let deadline = tokio::time::Instant::now() + QUIET;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected message: {text}"),
            Ok(Some(Ok(_))) => {}
            Ok(other) => panic!("stream ended: {other:?}"),
        }
    }
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

async fn roster(addr: SocketAddr, session: &str) -> Value {
    reqwest::get(format!("http://{addr}/sessions/{session}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Raw upgrade request so the rejection body can be read.
async fn upgrade_attempt(addr: SocketAddr, path: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("http://{addr}{path}"))
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .send()
        .await
        .unwrap()
}

// ── Admission ──

#[tokio::test]
async fn first_left_second_right() {
    let (addr, _server) = boot_default().await;
    let _p1 = join(addr, "room", "p1").await;
    let _p2 = join(addr, "room", "p2").await;

    let roster = roster(addr, "room").await;
    assert_eq!(
        roster["participants"],
        json!([
            {"id": "p1", "role": "left", "active": true},
            {"id": "p2", "role": "right", "active": false},
        ])
    );
    assert_eq!(roster["connections"], 2);
}

#[tokio::test]
async fn third_participant_rejected() {
    let (addr, _server) = boot_default().await;
    let _p1 = join(addr, "room", "p1").await;
    let _p2 = join(addr, "room", "p2").await;
    let before = roster(addr, "room").await;

    let err = connect_async(ws_url(addr, "room", "p3")).await.unwrap_err();
    assert!(
        matches!(&err, tokio_tungstenite::tungstenite::Error::Http(resp) if resp.status() == 400),
        "unexpected error: {err:?}"
    );

    let resp = upgrade_attempt(addr, "/sessions/room/ws?id=p3").await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "Too many users");

    assert_eq!(roster(addr, "room").await, before);
}

#[tokio::test]
async fn missing_id_rejected() {
    let (addr, server) = boot_default().await;
    let resp = upgrade_attempt(addr, "/sessions/room/ws").await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "Invalid id");
    assert_eq!(server.registry().session_count(), 0);
}

#[tokio::test]
async fn rejoin_with_same_id_when_full() {
    let (addr, _server) = boot_default().await;
    let _p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;
    let mut p1_again = join(addr, "room", "p1").await;

    send(&mut p1_again, json!({"senderId": "p1", "action": "start"})).await;
    assert_eq!(read_json(&mut p2).await, json!({"action": "start"}));
    assert_silent(&mut p1_again).await;
}

#[tokio::test]
async fn zero_queue_capacity_still_admits_and_relays() {
    let (addr, _server) = boot_server(ServerConfig {
        send_queue_capacity: 0,
        ..ServerConfig::default()
    })
    .await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    send(&mut p1, json!({"senderId": "p1", "action": "start"})).await;
    assert_eq!(read_json(&mut p2).await, json!({"action": "start"}));
}

// ── Routing ──

#[tokio::test]
async fn p1_p2_start_and_over_scenario() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    send(&mut p1, json!({"senderId": "p1", "action": "start"})).await;
    assert_eq!(read_text(&mut p2).await, r#"{"action":"start"}"#);
    assert_silent(&mut p1).await;

    ws_send_raw(
        &mut p2,
        r#"{"senderId":"p2","action":"over","message":{"x":1,"y":2,"dx":0,"dy":-1}}"#,
    )
    .await;
    assert_eq!(
        read_text(&mut p1).await,
        r#"{"action":"over","message":{"x":1,"y":2,"dx":0,"dy":-1}}"#
    );
    assert_silent(&mut p2).await;

    let roster = roster(addr, "room").await;
    assert_eq!(roster["participants"][1]["id"], "p2");
    assert_eq!(roster["participants"][1]["active"], false);
}

async fn ws_send_raw(ws: &mut WsStream, raw: &str) {
    ws.send(Message::text(raw)).await.unwrap();
}

#[tokio::test]
async fn score_relays_winner() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    send(&mut p2, json!({"senderId": "p2", "action": "score", "winner": "left"})).await;
    assert_eq!(
        read_json(&mut p1).await,
        json!({"action": "score", "winner": "left"})
    );
    send(&mut p1, json!({"senderId": "p1", "action": "stop"})).await;
    assert_eq!(read_json(&mut p2).await, json!({"action": "stop"}));
}

#[tokio::test]
async fn invalid_sender_notice() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    send(&mut p1, json!({"senderId": "ghost", "action": "start"})).await;
    assert_eq!(read_text(&mut p1).await, "Invalid sender");
    assert_silent(&mut p2).await;
}

#[tokio::test]
async fn invalid_action_notice() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    send(&mut p1, json!({"senderId": "p1", "action": "jump"})).await;
    assert_eq!(read_text(&mut p1).await, "Invalid action");
    assert_silent(&mut p2).await;
}

#[tokio::test]
async fn malformed_message_is_dropped_and_socket_survives() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    ws_send_raw(&mut p1, "{not json").await;
    ws_send_raw(&mut p1, r#"{"senderId":"p1","action":"score","winner":"middle"}"#).await;
    assert_silent(&mut p1).await;
    assert_silent(&mut p2).await;

    send(&mut p1, json!({"senderId": "p1", "action": "start"})).await;
    assert_eq!(read_json(&mut p2).await, json!({"action": "start"}));
}

#[tokio::test]
async fn binary_frames_are_dispatched() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    p1.send(Message::binary(br#"{"senderId":"p1","action":"start"}"#.to_vec()))
        .await
        .unwrap();
    assert_eq!(read_json(&mut p2).await, json!({"action": "start"}));
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (addr, _server) = boot_default().await;
    let mut a1 = join(addr, "a", "p1").await;
    let mut a2 = join(addr, "a", "p2").await;
    let mut b1 = join(addr, "b", "p1").await;

    send(&mut a1, json!({"senderId": "p1", "action": "start"})).await;
    assert_eq!(read_json(&mut a2).await, json!({"action": "start"}));
    assert_silent(&mut b1).await;
}

// ── Lifecycle ──

#[tokio::test]
async fn close_code_is_echoed() {
    let (addr, _server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;

    p1.send(Message::Close(Some(CloseFrame {
        code: CloseCode::from(4000),
        reason: "game over".into(),
    })))
    .await
    .unwrap();

    let frame = read_close(&mut p1).await.expect("close frame without payload");
    assert_eq!(u16::from(frame.code), 4000);
    assert_eq!(frame.reason.as_str(), "game over");
}

#[tokio::test]
async fn roster_kept_after_disconnect_by_default() {
    let (addr, server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;
    p1.close(None).await.unwrap();
    drop(p1);

    let session = server.registry().get("room").unwrap();
    timeout(TIMEOUT, async {
        while session.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(session.participant_count(), 1);
}

#[tokio::test]
async fn eviction_frees_the_slot() {
    let config = ServerConfig {
        evict_on_disconnect: true,
        ..ServerConfig::default()
    };
    let (addr, server) = boot_server(config).await;
    let mut p1 = join(addr, "room", "p1").await;
    let mut p2 = join(addr, "room", "p2").await;

    p1.close(None).await.unwrap();
    drop(p1);

    let session = server.registry().get("room").unwrap();
    timeout(TIMEOUT, async {
        while session.participant_count() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let mut p3 = join(addr, "room", "p3").await;
    send(&mut p3, json!({"senderId": "p3", "action": "start"})).await;
    assert_eq!(read_json(&mut p2).await, json!({"action": "start"}));

    let roster = roster(addr, "room").await;
    assert_eq!(roster["participants"][0]["id"], "p2");
    assert_eq!(roster["participants"][1]["id"], "p3");
    assert_eq!(roster["participants"][1]["role"], "right");
}

#[tokio::test]
async fn server_pings_on_heartbeat_interval() {
    let config = ServerConfig {
        heartbeat_interval_ms: 50,
        heartbeat_timeout_ms: 5_000,
        ..ServerConfig::default()
    };
    let (addr, _server) = boot_server(config).await;
    let mut p1 = join(addr, "room", "p1").await;

    let ping = timeout(TIMEOUT, async {
        loop {
            if let Some(Ok(Message::Ping(_))) = p1.next().await {
                return;
            }
        }
    })
    .await;
    assert!(ping.is_ok());
}

#[tokio::test]
async fn shutdown_closes_sockets() {
    let (addr, server) = boot_default().await;
    let mut p1 = join(addr, "room", "p1").await;

    server.shutdown().shutdown();
    let frame = read_close(&mut p1).await.expect("close frame without payload");
    assert_eq!(frame.code, CloseCode::Away);
}

// ── HTTP ──

#[tokio::test]
async fn health_counts_connections() {
    let (addr, _server) = boot_default().await;
    let _p1 = join(addr, "room", "p1").await;

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);
    assert_eq!(health["active_sessions"], 1);
}

#[tokio::test]
async fn unknown_session_roster_is_404() {
    let (addr, _server) = boot_default().await;
    let resp = reqwest::get(format!("http://{addr}/sessions/nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}
