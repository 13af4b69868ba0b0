//! Transport to the device bridge

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::ControllerOptions;
use crate::errors::{BridgeError, BridgeResult};

/// JSON frame channel to the device bridge
#[async_trait]
pub trait ControllerTransport: Send {
    async fn send(&mut self, message: Value) -> BridgeResult<()>;

    /// Next JSON frame; `Ok(None)` once the peer has closed the connection
    async fn recv(&mut self) -> BridgeResult<Option<Value>>;

    async fn close(&mut self) -> BridgeResult<()>;
}

/// Opens transports; one call per controller instance
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ControllerOptions) -> BridgeResult<Box<dyn ControllerTransport>>;
}

/// WebSocket connector used against a real bridge
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, options: &ControllerOptions) -> BridgeResult<Box<dyn ControllerTransport>> {
        let (stream, _response) = connect_async(options.url.as_str()).await?;
        debug!("Controller WS connected to {}", options.url);
        Ok(Box::new(WsTransport { stream }))
    }
}

#[async_trait]
impl ControllerTransport for WsTransport {
    async fn send(&mut self, message: Value) -> BridgeResult<()> {
        self.stream.send(Message::Text(message.to_string())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> BridgeResult<Option<Value>> {
        while let Some(frame) = self.stream.next().await {
            let value: Result<Value, serde_json::Error> = match frame? {
                Message::Text(text) => serde_json::from_str(&text),
                Message::Binary(bytes) => serde_json::from_slice(&bytes),
                Message::Close(_) => return Ok(None),
                _ => continue,
            };
            return value.map(Some).map_err(|e| BridgeError::protocol(format!("invalid frame: {}", e)));
        }
        Ok(None)
    }

    async fn close(&mut self) -> BridgeResult<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
