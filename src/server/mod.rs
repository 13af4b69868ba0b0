//! WebSocket cache server
//!
//! Stands in for the blockchain backend the SDK would otherwise contact.
//! One instance per run; created at start, closed exactly once at the end.

pub mod protocol;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::cache::{preprocess_coins_json, CacheSubstitutionGate};
use crate::config::CacheServerConfig;
use crate::errors::{BridgeError, BridgeResult};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ServerState {
    gate: Arc<CacheSubstitutionGate>,
    shutdown: CancellationToken,
}

pub struct WebSocketCacheServer {
    config: CacheServerConfig,
    gate: Arc<CacheSubstitutionGate>,
}

/// Handle to a started (or intentionally not started) server
pub struct CacheServerHandle {
    running: Option<RunningServer>,
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl WebSocketCacheServer {
    pub fn new(config: CacheServerConfig, gate: Arc<CacheSubstitutionGate>) -> Self {
        Self { config, gate }
    }

    /// Binds and serves in the background.
    ///
    /// With the feature disabled this returns at once without touching the network.
    pub async fn start(&self) -> BridgeResult<CacheServerHandle> {
        if !self.config.enabled {
            debug!("Websocket cache disabled, server not started");
            return Ok(CacheServerHandle::disabled());
        }

        let addr = self
            .config
            .socket_addr()
            .map_err(|e| BridgeError::Configuration {
                message: e.to_string(),
            })?;

        info!("Starting websocket server...");
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let state = ServerState {
            gate: self.gate.clone(),
            shutdown: shutdown.clone(),
        };

        let router = Router::new()
            .route("/", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
            if let Err(e) = served {
                warn!("Websocket cache server error: {}", e);
            }
        });

        info!("Websocket cache server listening on {}", local_addr);
        Ok(CacheServerHandle {
            running: Some(RunningServer {
                local_addr,
                shutdown,
                task,
            }),
        })
    }
}

impl CacheServerHandle {
    pub fn disabled() -> Self {
        Self { running: None }
    }

    /// `None` when no socket was ever bound or the server is closed
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn is_listening(&self) -> bool {
        self.running.is_some()
    }

    /// Address to put into coin definitions
    pub fn endpoint(&self) -> Option<String> {
        self.local_addr().map(|addr| format!("ws://{}", addr))
    }

    /// Points the SDK coin definitions at this server.
    ///
    /// A disabled or closed handle returns `content` unchanged.
    pub fn preprocess_coins(&self, content: &str) -> BridgeResult<String> {
        match self.endpoint() {
            Some(endpoint) => preprocess_coins_json(content, true, &endpoint),
            None => preprocess_coins_json(content, false, ""),
        }
    }

    /// Stops the listener and open sockets. Later calls do nothing.
    pub async fn close(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.cancel();
        let mut task = running.task;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            warn!("Websocket cache server did not stop in time, aborting");
            task.abort();
        }
        info!("Websocket cache server on {} closed", running.local_addr);
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServerState) {
    loop {
        let message = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            message = socket.recv() => message,
        };

        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!("Websocket cache client error: {}", e);
                break;
            }
        };

        let reply = protocol::respond(&state.gate, &text);
        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }

    let _ = socket.close().await;
}
