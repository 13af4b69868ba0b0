/// Fixture Bridge Library
///
/// Drives a hardware wallet emulator through fixture-described test suites
/// while serving cached network data, so runs are deterministic and do not
/// depend on live backends.

// Core modules
pub mod cache;
pub mod config;
pub mod controller;
pub mod errors;
pub mod fixtures;
pub mod orchestrator;
pub mod resolver;
pub mod rules;
pub mod server;

// Re-export commonly used types
pub use cache::{CacheSubstitutionGate, ResultCache};
pub use config::BridgeConfig;
pub use controller::{DeviceController, WsConnector};
pub use errors::{BridgeError, BridgeResult};
pub use fixtures::{FixtureCase, FixtureSuite};
pub use orchestrator::{DeviceCommands, Orchestrator, RunReport};
pub use resolver::{resolve, ExpectedOutcome};
pub use rules::{Environment, Rule, RuleSet};
pub use server::{CacheServerHandle, WebSocketCacheServer};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging for library consumers and tests
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fixture_bridge=debug,info".into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();

    tracing::debug!("{} initialized", version_info());
}

/// Get version information
pub fn version_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
