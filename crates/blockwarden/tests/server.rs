//! Integration tests for the running server: agent socket, ingress,
//! registry and the HTTP view of it, end to end.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode, header};
use blockwarden::prelude::*;
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

// =========================================================================
// Helpers
// =========================================================================

type AgentWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Running {
    _tmp: TempDir,
    agent_addr: SocketAddr,
    app: Router,
    token: String,
    _stop: oneshot::Sender<()>,
}

/// Builds a server on random ports, starts it, and logs in as admin.
async fn start_server(agent_key: Option<&str>, eviction: EvictionPolicy) -> Running {
    let tmp = tempfile::tempdir().expect("tempdir");
    let server = PanelServer::builder()
        .bind("127.0.0.1:0")
        .agent_bind("127.0.0.1:0")
        .jwt_secret("integration-secret")
        .agent_key(agent_key)
        .mods_path(tmp.path().join("mods"))
        .password_cost(4)
        .eviction(eviction)
        .build()
        .await
        .expect("server should build");

    let agent_addr = server.agent_addr().expect("agent addr");
    let app = server
        .router()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(async {
                let _ = stopped.await;
            })
            .await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();

    Running {
        _tmp: tmp,
        agent_addr,
        app,
        token,
        _stop: stop,
    }
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn connect(addr: SocketAddr, key: Option<&str>) -> AgentWs {
    let url = match key {
        Some(key) => format!("ws://{addr}/?key={key}"),
        None => format!("ws://{addr}"),
    };
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("should connect");
    ws
}

async fn players(running: &Running) -> Vec<Value> {
    let (status, body) =
        call(&running.app, "GET", "/api/players", Some(&running.token), None).await;
    assert_eq!(status, StatusCode::OK);
    body["players"].as_array().cloned().unwrap_or_default()
}

/// Polls the player list until `check` holds or a second passes.
async fn wait_for_players(running: &Running, check: impl Fn(&[Value]) -> bool) -> Vec<Value> {
    for _ in 0..100 {
        let list = players(running).await;
        if check(list.as_slice()) {
            return list;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("player list never reached the expected state");
}

fn steve_frame(y: f64) -> Message {
    Message::text(
        json!({
            "uuid": "u1",
            "name": "Steve",
            "x": 0.0,
            "y": y,
            "z": 0.0,
            "inventory": [{ "slot": 0, "id": "minecraft:cobblestone", "count": 64 }],
        })
        .to_string(),
    )
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_agent_update_appears_in_player_list() {
    let running = start_server(None, EvictionPolicy::Retain).await;
    let mut ws = connect(running.agent_addr, None).await;

    ws.send(steve_frame(64.0)).await.expect("send");

    let list = wait_for_players(&running, |p| p.len() == 1).await;
    assert_eq!(list[0]["uuid"], "u1");
    assert_eq!(list[0]["name"], "Steve");
    assert_eq!(list[0]["y"], 64.0);
    assert_eq!(list[0]["inventory"][0]["count"], 64);
}

#[tokio::test]
async fn test_agent_latest_update_wins() {
    let running = start_server(None, EvictionPolicy::Retain).await;
    let mut ws = connect(running.agent_addr, None).await;

    ws.send(steve_frame(64.0)).await.expect("send");
    ws.send(steve_frame(70.0)).await.expect("send");

    let list = wait_for_players(&running, |p| p.len() == 1 && p[0]["y"] == 70.0).await;
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn test_agent_garbage_frame_keeps_connection_open() {
    let running = start_server(None, EvictionPolicy::Retain).await;
    let mut ws = connect(running.agent_addr, None).await;

    ws.send(Message::text("hello there")).await.expect("send garbage");
    ws.send(Message::text(r#"{"uuid":"u2"}"#)).await.expect("send incomplete");
    ws.send(steve_frame(64.0)).await.expect("send valid");

    let list = wait_for_players(&running, |p| !p.is_empty()).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["uuid"], "u1");
}

#[tokio::test]
async fn test_teleport_reaches_agent_as_text_frame() {
    let running = start_server(None, EvictionPolicy::Retain).await;
    let mut ws = connect(running.agent_addr, None).await;
    ws.send(steve_frame(64.0)).await.expect("send");
    wait_for_players(&running, |p| p.len() == 1).await;

    let (status, body) = call(
        &running.app,
        "POST",
        "/api/server/players/u1/teleport",
        Some(&running.token),
        Some(json!({ "x": 100, "y": 70.5, "z": -20 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "command": "tp u1 100 70.5 -20" }));

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("command within timeout")
        .expect("stream open")
        .expect("frame");
    let Message::Text(text) = msg else {
        panic!("expected a text frame, got {msg:?}");
    };
    let command: Value = serde_json::from_str(text.as_str()).expect("json command");
    assert_eq!(
        command,
        json!({ "type": "teleport", "target": "Steve", "x": 100.0, "y": 70.5, "z": -20.0 })
    );
}

#[tokio::test]
async fn test_on_disconnect_eviction_drops_players() {
    let running = start_server(None, EvictionPolicy::OnDisconnect).await;
    let mut ws = connect(running.agent_addr, None).await;
    ws.send(steve_frame(64.0)).await.expect("send");
    wait_for_players(&running, |p| p.len() == 1).await;

    ws.close(None).await.expect("close");

    wait_for_players(&running, |p| p.is_empty()).await;
}

#[tokio::test]
async fn test_retain_policy_keeps_players_after_disconnect() {
    let running = start_server(None, EvictionPolicy::Retain).await;
    let mut ws = connect(running.agent_addr, None).await;
    ws.send(steve_frame(64.0)).await.expect("send");
    wait_for_players(&running, |p| p.len() == 1).await;

    ws.close(None).await.expect("close");

    // Still listed, but no longer routable once the link is released.
    let mut status = StatusCode::OK;
    for _ in 0..100 {
        (status, _) = call(
            &running.app,
            "POST",
            "/api/server/players/u1/teleport",
            Some(&running.token),
            Some(json!({ "x": 0, "y": 64, "z": 0 })),
        )
        .await;
        if status == StatusCode::NOT_FOUND {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(players(&running).await.len(), 1);
}

#[tokio::test]
async fn test_silent_peer_does_not_block_agent_connect() {
    let running = start_server(None, EvictionPolicy::Retain).await;
    let _silent = tokio::net::TcpStream::connect(running.agent_addr)
        .await
        .expect("raw connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut ws = tokio::time::timeout(Duration::from_secs(3), connect(running.agent_addr, None))
        .await
        .expect("agent connects while another peer stalls");
    ws.send(steve_frame(64.0)).await.expect("send");

    wait_for_players(&running, |p| p.len() == 1).await;
}

#[tokio::test]
async fn test_agent_key_required_when_configured() {
    let running = start_server(Some("s3cret"), EvictionPolicy::Retain).await;

    let url = format!("ws://{}/?key=wrong", running.agent_addr);
    let refused = tokio_tungstenite::connect_async(url).await;
    assert!(refused.is_err());

    let mut ws = connect(running.agent_addr, Some("s3cret")).await;
    ws.send(steve_frame(64.0)).await.expect("send");
    wait_for_players(&running, |p| p.len() == 1).await;
}
