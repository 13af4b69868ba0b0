use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::controller::ControllerOptions;

/// Konfiguracja połączenia z bridge urządzenia (trezor-user-env)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Adres websocket bridge
    pub url: String,

    /// Etykieta połączenia, tylko do logów
    pub name: String,

    /// Timeout nawiązania połączenia (w milisekundach)
    pub connect_timeout_ms: u64,

    /// Timeout pojedynczego żądania (w milisekundach)
    pub request_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9001/".to_string(),
            name: "fixture-bridge".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            anyhow::bail!("controller url must use ws:// or wss://, got {}", url.scheme());
        }

        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            anyhow::bail!("controller timeouts must be greater than 0");
        }

        Ok(())
    }

    pub fn to_options(&self) -> ControllerOptions {
        ControllerOptions {
            url: self.url.clone(),
            name: self.name.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}
