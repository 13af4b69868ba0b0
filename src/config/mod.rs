use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod cache;
pub mod controller;

pub use cache::CacheServerConfig;
pub use controller::ControllerConfig;

/// Główna konfiguracja mostu testowego
///
/// Przełączniki środowiskowe (`TESTS_*`) są czytane raz przy starcie
/// i nie zmieniają się w trakcie przebiegu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Czy podstawiać odpowiedzi z cache transakcji
    pub use_tx_cache: bool,

    /// Czy uruchamiać serwer websocket cache
    pub use_ws_cache: bool,

    /// Wariant firmware (np. `2-master`, `2.3.1`)
    pub firmware: String,

    /// Lista metod do uruchomienia, rozdzielona przecinkami (pusta = wszystkie)
    pub included_methods: String,

    /// Połączenie z bridge urządzenia
    pub controller: ControllerConfig,

    /// Serwer websocket cache
    pub cache_server: CacheServerConfig,

    /// Limity czasu przebiegu
    pub timeouts: TimeoutConfig,

    /// Konfiguracja Sentry
    pub sentry: SentryConfig,
}

/// Limity czasu dla setupu suity i pojedynczego przypadku
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Setup suity (w milisekundach)
    pub setup_ms: u64,

    /// Domyślny limit przypadku testowego (w milisekundach)
    pub case_ms: u64,
}

/// Konfiguracja integracji Sentry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// DSN dla Sentry
    pub dsn: Option<String>,

    /// Środowisko dla Sentry
    pub environment: String,

    /// Sample rate dla traces (0.0 - 1.0)
    pub traces_sample_rate: f32,

    /// Debug mode
    pub debug: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            setup_ms: 40_000,
            case_ms: 20_000,
        }
    }
}

impl TimeoutConfig {
    pub fn setup(&self) -> Duration {
        Duration::from_millis(self.setup_ms)
    }

    pub fn case(&self) -> Duration {
        Duration::from_millis(self.case_ms)
    }
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: "test".to_string(),
            traces_sample_rate: 1.0,
            debug: cfg!(debug_assertions),
        }
    }
}

impl BridgeConfig {
    /// Ładuje konfigurację z pliku TOML i zmiennych środowiskowych
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config/bridge.toml"))
    }

    /// Ładuje konfigurację z podanego pliku (jeśli istnieje) i zmiennych `TESTS_*`
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = config::Config::builder();

        if path.exists() {
            settings = settings.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        // TESTS_USE_TX_CACHE -> use_tx_cache, TESTS_CONTROLLER__URL -> controller.url
        settings = settings.add_source(
            config::Environment::with_prefix("TESTS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .context("Failed to build configuration")?
            .try_deserialize::<Self>()
            .context("Failed to deserialize configuration")?;

        Ok(config)
    }

    /// Waliduje konfigurację
    pub fn validate(&self) -> Result<()> {
        if self.firmware.trim().is_empty() {
            anyhow::bail!("firmware must not be empty");
        }

        self.controller
            .validate()
            .context("Controller configuration validation failed")?;

        self.cache_server
            .validate()
            .context("Cache server configuration validation failed")?;

        if self.timeouts.setup_ms == 0 || self.timeouts.case_ms == 0 {
            anyhow::bail!("timeouts must be greater than 0");
        }

        if let Some(ref dsn) = self.sentry.dsn {
            if dsn.is_empty() {
                anyhow::bail!("Sentry DSN cannot be empty if provided");
            }
        }

        if !(0.0..=1.0).contains(&self.sentry.traces_sample_rate) {
            anyhow::bail!("Sentry traces_sample_rate must be between 0.0 and 1.0");
        }

        tracing::info!("Configuration validation passed");
        Ok(())
    }

    /// Metody wybrane filtrem `TESTS_INCLUDED_METHODS`
    pub fn method_filter(&self) -> Vec<String> {
        self.included_methods
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Konfiguracja serwera cache z flagą `use_ws_cache`
    pub fn effective_cache_server(&self) -> CacheServerConfig {
        CacheServerConfig {
            enabled: self.use_ws_cache,
            ..self.cache_server.clone()
        }
    }

    /// Inicjalizuje Sentry z bieżącą konfiguracją
    pub fn init_sentry(&self) -> sentry::ClientInitGuard {
        let dsn = self.sentry.dsn.clone().unwrap_or_default();

        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(self.sentry.environment.clone().into()),
                traces_sample_rate: self.sentry.traces_sample_rate,
                debug: self.sentry.debug,
                ..Default::default()
            },
        ))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            use_tx_cache: true,
            use_ws_cache: false,
            firmware: "2-master".to_string(),
            included_methods: String::new(),
            controller: ControllerConfig::default(),
            cache_server: CacheServerConfig::default(),
            timeouts: TimeoutConfig::default(),
            sentry: SentryConfig::default(),
        }
    }
}
