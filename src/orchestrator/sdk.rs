use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::ControllerOptions;
use crate::errors::BridgeResult;

/// Reply of a device command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CommandResponse {
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Some(serde_json::json!({ "error": error.into() })),
        }
    }
}

/// Device SDK command surface, one call per command name
#[async_trait]
pub trait DeviceCommands: Send {
    /// Prepares the SDK for a suite against the device behind `bridge`
    async fn init(&mut self, bridge: &ControllerOptions) -> BridgeResult<()>;

    async fn call(&mut self, method: &str, params: &Value) -> CommandResponse;

    async fn get_features(&mut self) -> CommandResponse {
        self.call("getFeatures", &Value::Null).await
    }

    async fn dispose(&mut self);
}
