use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Błędy mostu testowego z integracją Sentry
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    /// Bridge nieosiągalny albo połączenie zamknięte
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Nie udało się załadować seeda na urządzenie
    #[error("Setup error: {message}")]
    Setup { message: String },

    /// Urządzenie odrzuciło polecenie kontrolera
    #[error("Command error: {command} - {message}")]
    Command { command: String, message: String },

    /// Niepoprawna ramka protokołu
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Błędy timeout
    #[error("Timeout error: {operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Błędy konfiguracji
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Błędy parsowania
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Błędy IO
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Kontekst błędu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Komponent, w którym wystąpił błąd
    pub component: String,

    /// Operacja, podczas której wystąpił błąd
    pub operation: String,

    /// Dodatkowe metadane
    pub metadata: serde_json::Value,

    /// Czas wystąpienia
    pub timestamp: i64,
}

impl BridgeError {
    pub fn connection(message: impl Into<String>) -> Self {
        BridgeError::Connection {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        BridgeError::Protocol {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        BridgeError::Timeout {
            operation: operation.into(),
            seconds: duration.as_secs(),
        }
    }

    /// Zwraca poziom błędu dla Sentry
    pub fn sentry_level(&self) -> sentry::Level {
        match self {
            BridgeError::Connection { .. } => sentry::Level::Error,
            BridgeError::Setup { .. } => sentry::Level::Error,
            BridgeError::Command { .. } => sentry::Level::Warning,
            BridgeError::Protocol { .. } => sentry::Level::Warning,
            BridgeError::Timeout { .. } => sentry::Level::Warning,
            BridgeError::Configuration { .. } => sentry::Level::Error,
            BridgeError::Parse { .. } => sentry::Level::Warning,
            BridgeError::Io { .. } => sentry::Level::Error,
        }
    }

    /// Zwraca kategorię błędu
    pub fn category(&self) -> &'static str {
        match self {
            BridgeError::Connection { .. } => "connection",
            BridgeError::Setup { .. } => "setup",
            BridgeError::Command { .. } => "command",
            BridgeError::Protocol { .. } => "protocol",
            BridgeError::Timeout { .. } => "timeout",
            BridgeError::Configuration { .. } => "configuration",
            BridgeError::Parse { .. } => "parse",
            BridgeError::Io { .. } => "io",
        }
    }

    /// Czy błąd oznacza utratę połączenia z bridge
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, BridgeError::Connection { .. })
    }

    /// Raportuje błąd do Sentry z kontekstem
    pub fn report_to_sentry(&self, context: Option<ErrorContext>) {
        sentry::configure_scope(|scope| {
            scope.set_tag("error_category", self.category());

            if let Some(ctx) = &context {
                scope.set_tag("component", &ctx.component);
                scope.set_tag("operation", &ctx.operation);
                scope.set_extra("metadata", ctx.metadata.clone());
                scope.set_extra("timestamp", ctx.timestamp.into());
            }
        });

        sentry::capture_error(self);

        match self.sentry_level() {
            sentry::Level::Fatal | sentry::Level::Error => tracing::error!("{}", self),
            sentry::Level::Warning => tracing::warn!("{}", self),
            _ => tracing::info!("{}", self),
        }
    }
}

impl ErrorContext {
    /// Tworzy nowy kontekst błędu
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: serde_json::Value::Null,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Dodaje metadane do kontekstu
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Konwersje z popularnych błędów
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Parse {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io {
            message: err.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BridgeError::Connection {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Result type dla mostu testowego
pub type BridgeResult<T> = Result<T, BridgeError>;
