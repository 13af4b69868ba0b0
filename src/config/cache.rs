use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Konfiguracja serwera websocket cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheServerConfig {
    /// Ustawiane z `use_ws_cache`
    pub enabled: bool,

    /// Adres nasłuchu
    pub host: String,

    /// Port nasłuchu (0 = dowolny wolny)
    pub port: u16,

    /// Własny plik z danymi cache zamiast wbudowanego
    pub dataset: Option<PathBuf>,

    /// Definicje monet SDK do przepięcia na serwer cache
    pub coins: Option<PathBuf>,

    /// Gdzie zapisać przepięte definicje (domyślnie obok źródła)
    pub coins_output: Option<PathBuf>,
}

impl Default for CacheServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 18088,
            dataset: None,
            coins: None,
            coins_output: None,
        }
    }
}

impl CacheServerConfig {
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if let Some(ref dataset) = self.dataset {
            if !dataset.exists() {
                anyhow::bail!("cache dataset {:?} does not exist", dataset);
            }
        }

        if let Some(ref coins) = self.coins {
            if !coins.exists() {
                anyhow::bail!("coins definitions {:?} do not exist", coins);
            }
        }

        Ok(())
    }

    /// Target of the rewritten coin definitions, if any
    pub fn coins_target(&self) -> Option<PathBuf> {
        let source = self.coins.as_ref()?;
        Some(
            self.coins_output
                .clone()
                .unwrap_or_else(|| source.with_extension("ws-cache.json")),
        )
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse::<SocketAddr>()?;
        Ok(addr)
    }
}
