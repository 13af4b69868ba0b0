//! Device controller
//!
//! Owns the single connection to the device bridge (trezor-user-env) and
//! loads seeds onto the emulator. Requests carry a numeric `id`; the bridge
//! answers `{"id", "success", "response"?, "error"?}`.

pub mod transport;

use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{BridgeError, BridgeResult};
use crate::fixtures::DeviceSetup;

pub use transport::{Connector, ControllerTransport, WsConnector, WsTransport};

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub url: String,
    /// Diagnostic label only
    pub name: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        crate::config::ControllerConfig::default().to_options()
    }
}

/// Connection-level notification recorded by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Error(String),
    Disconnected,
}

/// Request to the device bridge: `type` plus free-form fields
#[derive(Debug, Clone)]
pub struct ControllerRequest {
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl ControllerRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    fn into_frame(self, id: u64) -> Value {
        let mut frame = self.fields;
        frame.insert("id".to_string(), json!(id));
        frame.insert("type".to_string(), Value::String(self.kind));
        Value::Object(frame)
    }
}

pub struct DeviceController {
    transport: Option<Box<dyn ControllerTransport>>,
    options: ControllerOptions,
    next_id: u64,
    event: Option<ControllerEvent>,
}

impl DeviceController {
    pub async fn connect(connector: &dyn Connector, options: ControllerOptions) -> BridgeResult<Self> {
        info!("Connecting controller {} to {}", options.name, options.url);

        let transport = tokio::time::timeout(options.connect_timeout, connector.connect(&options))
            .await
            .map_err(|_| BridgeError::connection(format!("connecting to {} timed out", options.url)))??;

        Ok(Self {
            transport: Some(transport),
            options,
            next_id: 1,
            event: None,
        })
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Relabels the connection for logs, usually with the running case description
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.options.name = name.into();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns and clears the last connection event
    pub fn take_event(&mut self) -> Option<ControllerEvent> {
        self.event.take()
    }

    /// Sends a request and waits for the reply with the same id
    pub async fn send(&mut self, request: ControllerRequest) -> BridgeResult<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let kind = request.kind.clone();
        let timeout = self.options.request_timeout;

        let Some(transport) = self.transport.as_mut() else {
            return Err(BridgeError::connection("controller is not connected"));
        };

        debug!("[{}] -> {} #{}", self.options.name, kind, id);
        let frame = request.into_frame(id);
        let outcome = match tokio::time::timeout(timeout, exchange(transport.as_mut(), frame, id)).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(BridgeError::timeout(kind, timeout)),
        };

        match outcome {
            Ok(Some(frame)) => reply_payload(&kind, frame),
            Ok(None) => {
                warn!("Controller WS disconnected");
                self.drop_transport(ControllerEvent::Disconnected).await;
                Err(BridgeError::connection("device bridge closed the connection"))
            }
            Err(e) if e.is_connection_loss() => {
                warn!("Controller WS error: {}", e);
                self.drop_transport(ControllerEvent::Error(e.to_string())).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Loads a seed and device options; returns once the device reports ready
    pub async fn setup(&mut self, setup: &DeviceSetup) -> BridgeResult<()> {
        let mut request = ControllerRequest::new("emulator-setup");
        if let Value::Object(fields) = serde_json::to_value(setup)? {
            request.fields = fields;
        }

        info!("[{}] Loading device setup", self.options.name);
        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(e @ BridgeError::Connection { .. }) | Err(e @ BridgeError::Timeout { .. }) => Err(e),
            Err(e) => Err(BridgeError::Setup {
                message: e.to_string(),
            }),
        }
    }

    /// Closes the connection. Safe to call more than once.
    pub async fn dispose(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Ignoring error while closing controller: {}", e);
            }
            info!("Controller {} disposed", self.options.name);
        }
    }

    async fn drop_transport(&mut self, event: ControllerEvent) {
        self.event = Some(event);
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
    }
}

async fn exchange(
    transport: &mut dyn ControllerTransport,
    frame: Value,
    id: u64,
) -> BridgeResult<Option<Value>> {
    transport.send(frame).await?;
    loop {
        match transport.recv().await? {
            Some(reply) if reply.get("id").and_then(Value::as_u64) == Some(id) => return Ok(Some(reply)),
            Some(other) => debug!("Skipping unrelated bridge frame: {}", other),
            None => return Ok(None),
        }
    }
}

fn reply_payload(kind: &str, mut frame: Value) -> BridgeResult<Value> {
    if frame.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(frame
            .get_mut("response")
            .map(Value::take)
            .unwrap_or(Value::Null));
    }

    let message = frame
        .get("error")
        .map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "request failed".to_string());

    Err(BridgeError::Command {
        command: kind.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame() {
        let frame = ControllerRequest::new("emulator-setup")
            .with_field("mnemonic", json!("all all all"))
            .into_frame(7);
        assert_eq!(frame, json!({ "id": 7, "type": "emulator-setup", "mnemonic": "all all all" }));
    }

    #[test]
    fn test_reply_payload() {
        let ok = reply_payload("x", json!({ "id": 1, "success": true, "response": { "a": 1 } }));
        assert_eq!(ok.unwrap(), json!({ "a": 1 }));

        let err = reply_payload("x", json!({ "id": 1, "success": false, "error": "boom" })).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Command {
                command: "x".to_string(),
                message: "boom".to_string()
            }
        );
    }
}
