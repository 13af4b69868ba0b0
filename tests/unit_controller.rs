
use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use fixture_bridge::{
    controller::{ControllerEvent, ControllerOptions, ControllerRequest, DeviceController, WsConnector},
    errors::BridgeError,
    fixtures::DeviceSetup,
};
use serde_json::{json, Value};
use std::time::Duration;
use test_utils::*;
use tokio::net::TcpListener;

/// Unit tests for the device controller

fn options() -> ControllerOptions {
    ControllerOptions {
        url: "ws://localhost:9001/".to_string(),
        name: "unit".to_string(),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_setup_sends_seed_and_waits_for_ack() -> Result<()> {
    let script = BridgeScript::new(timeline());
    let mut controller = DeviceController::connect(script.connector().as_ref(), options()).await?;

    controller.setup(&DeviceSetup::with_mnemonic(M1)).await?;

    let sent = script.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["type"], "emulator-setup");
    assert_eq!(sent[0]["mnemonic"], M1);
    assert_eq!(sent[0]["id"], 1);
    assert!(sent[0].get("pin").is_none());
    assert!(controller.is_connected());
    Ok(())
}

#[tokio::test]
async fn test_rejected_setup_is_setup_error() -> Result<()> {
    let script = BridgeScript::new(timeline());
    script.reject_mnemonic(M2);
    let mut controller = DeviceController::connect(script.connector().as_ref(), options()).await?;

    let err = controller.setup(&DeviceSetup::with_mnemonic(M2)).await.unwrap_err();

    assert!(matches!(err, BridgeError::Setup { .. }));
    assert!(err.to_string().contains("Invalid mnemonic"));
    // The connection itself is still usable
    assert!(controller.is_connected());
    assert_eq!(controller.take_event(), None);
    Ok(())
}

#[tokio::test]
async fn test_disconnect_clears_transport_and_records_event() -> Result<()> {
    let script = BridgeScript::new(timeline());
    let mut controller = DeviceController::connect(script.connector().as_ref(), options()).await?;

    script.drop_next_request();
    let err = controller.setup(&DeviceSetup::with_mnemonic(M1)).await.unwrap_err();

    assert!(err.is_connection_loss());
    assert!(!controller.is_connected());
    assert_eq!(controller.take_event(), Some(ControllerEvent::Disconnected));
    assert_eq!(controller.take_event(), None);

    let err = controller.send(ControllerRequest::new("ping")).await.unwrap_err();
    assert!(err.is_connection_loss());
    Ok(())
}

#[tokio::test]
async fn test_refused_connection() {
    let script = BridgeScript::new(timeline());
    *script.refuse_connections.lock().unwrap() = true;

    let result = DeviceController::connect(script.connector().as_ref(), options()).await;

    assert!(matches!(result, Err(BridgeError::Connection { .. })));
}

#[tokio::test]
async fn test_dispose_twice() -> Result<()> {
    let script = BridgeScript::new(timeline());
    let mut controller = DeviceController::connect(script.connector().as_ref(), options()).await?;

    controller.dispose().await;
    controller.dispose().await;

    assert!(!controller.is_connected());
    assert_eq!(script.close_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_name_is_diagnostic_only() -> Result<()> {
    let script = BridgeScript::new(timeline());
    let mut controller = DeviceController::connect(script.connector().as_ref(), options()).await?;

    controller.set_name("getAddress: first account");
    controller.setup(&DeviceSetup::with_mnemonic(M1)).await?;

    assert_eq!(controller.options().name, "getAddress: first account");
    let sent = script.sent.lock().unwrap().clone();
    assert!(sent[0].get("name").is_none());
    Ok(())
}

/// Minimal trezor-user-env stand-in: greets, then acknowledges every request
async fn fake_bridge(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(serve_bridge)
}

async fn serve_bridge(mut socket: WebSocket) {
    let greeting = json!({ "type": "client", "firmwares": {} }).to_string();
    if socket.send(Message::Text(greeting)).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let request: Value = match serde_json::from_str(&text) {
            Ok(request) => request,
            Err(_) => continue,
        };

        let reply = if request["type"] == "emulator-setup" && request["mnemonic"].is_null() {
            json!({ "id": request["id"], "success": false, "error": "mnemonic missing" })
        } else {
            json!({ "id": request["id"], "success": true, "response": { "echo": request["type"] } })
        };
        if socket.send(Message::Text(reply.to_string())).await.is_err() {
            break;
        }
    }
}

#[tokio::test]
async fn test_websocket_transport_against_fake_bridge() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let router = Router::new().route("/", get(fake_bridge));
        let _ = axum::serve(listener, router).await;
    });

    let mut opts = options();
    opts.url = format!("ws://{}/", addr);
    let mut controller = DeviceController::connect(&WsConnector, opts).await?;

    controller.setup(&DeviceSetup::with_mnemonic(M1)).await?;
    let response = controller.send(ControllerRequest::new("emulator-press-yes")).await?;
    assert_eq!(response, json!({ "echo": "emulator-press-yes" }));

    let err = controller.setup(&DeviceSetup::default()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Setup { .. }));

    controller.dispose().await;
    controller.dispose().await;
    assert!(!controller.is_connected());

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_unreachable_bridge_is_connection_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let mut opts = options();
    opts.url = format!("ws://{}/", addr);
    let result = DeviceController::connect(&WsConnector, opts).await;

    assert!(matches!(result, Err(BridgeError::Connection { .. })));
    Ok(())
}
