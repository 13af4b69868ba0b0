//! Fixture matrix runner
//!
//! Runs suites strictly one after another against the single device
//! controller: connect lazily, load the suite seed, run each case with seed
//! switching, resolve the expectation, compare. Teardown always runs once.

pub mod sdk;
pub mod session;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::controller::{Connector, ControllerOptions};
use crate::errors::{BridgeError, ErrorContext};
use crate::fixtures::{FixtureCase, FixtureSuite};
use crate::resolver::{match_subset, resolve, Mismatch};
use crate::rules::Environment;
use crate::server::CacheServerHandle;

pub use sdk::{CommandResponse, DeviceCommands};
pub use session::{case_setup, suite_needs_setup, SessionState};

/// Where the runner is in the current suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    ControllerReady,
    SeedReady,
    RunningCase,
    TornDown,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub controller: ControllerOptions,
    pub setup_timeout: Duration,
    pub case_timeout: Duration,
    /// Empty runs every suite
    pub included_methods: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            controller: config.controller.to_options(),
            setup_timeout: config.timeouts.setup(),
            case_timeout: config.timeouts.case(),
            included_methods: config.method_filter(),
        }
    }

    fn includes(&self, method: &str) -> bool {
        self.included_methods.is_empty() || self.included_methods.iter().any(|m| m == method)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseFailure {
    ControllerMissing,
    Bridge(BridgeError),
    Mismatch(Mismatch),
    TimedOut(Duration),
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseFailure::ControllerMissing => write!(f, "Controller not found"),
            CaseFailure::Bridge(e) => write!(f, "{}", e),
            CaseFailure::Mismatch(m) => write!(f, "{}", m),
            CaseFailure::TimedOut(d) => write!(f, "timed out after {}ms", d.as_millis()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Passed,
    Skipped,
    Failed(CaseFailure),
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub description: String,
    pub outcome: CaseOutcome,
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub method: String,
    pub setup_error: Option<BridgeError>,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub suites: Vec<SuiteReport>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&CaseOutcome) -> bool) -> usize {
        self.suites
            .iter()
            .flat_map(|s| &s.cases)
            .filter(|c| pred(&c.outcome))
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

pub struct Orchestrator<S: DeviceCommands> {
    connector: Arc<dyn Connector>,
    sdk: S,
    env: Environment,
    options: RunOptions,
    session: SessionState,
    cache_server: Option<CacheServerHandle>,
    phase: Phase,
}

impl<S: DeviceCommands> Orchestrator<S> {
    pub fn new(connector: Arc<dyn Connector>, sdk: S, env: Environment, options: RunOptions) -> Self {
        Self {
            connector,
            sdk,
            env,
            options,
            session: SessionState::new(),
            cache_server: None,
            phase: Phase::Init,
        }
    }

    /// Server to close at teardown
    pub fn with_cache_server(mut self, handle: CacheServerHandle) -> Self {
        self.cache_server = Some(handle);
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cache_server(&self) -> Option<&CacheServerHandle> {
        self.cache_server.as_ref()
    }

    /// Runs every included suite, then tears down
    pub async fn run(&mut self, suites: &[FixtureSuite]) -> RunReport {
        info!("Running device fixture tests...");
        info!("FW: {}", self.env.firmware);
        if self.options.included_methods.is_empty() {
            info!("Methods: All");
        } else {
            info!("Methods: {}", self.options.included_methods.join(","));
        }

        let mut report = RunReport::default();
        for suite in suites {
            if !self.options.includes(&suite.method) {
                continue;
            }
            report.suites.push(self.run_suite(suite).await);
        }

        self.teardown().await;
        info!(
            "Run complete: {} passed, {} failed, {} skipped",
            report.passed(),
            report.failed(),
            report.skipped()
        );
        report
    }

    pub async fn run_suite(&mut self, suite: &FixtureSuite) -> SuiteReport {
        info!("Suite {}", suite.method);
        self.phase = Phase::Init;

        let setup_error = match tokio::time::timeout(self.options.setup_timeout, self.prepare_suite(suite)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(BridgeError::timeout("suite setup", self.options.setup_timeout)),
        };
        if let Some(ref e) = setup_error {
            error!("Controller WS init error: {}", e);
            e.report_to_sentry(Some(
                ErrorContext::new("orchestrator", "suite setup")
                    .with_metadata(serde_json::json!({ "method": suite.method })),
            ));
            self.session.settle().await;
        }

        let mut cases = Vec::with_capacity(suite.tests.len());
        for case in &suite.tests {
            let outcome = if case.skip.matches(&self.env) {
                info!("Skipping {}: {}", suite.method, case.description);
                CaseOutcome::Skipped
            } else if let Some(ref e) = setup_error {
                CaseOutcome::Failed(CaseFailure::Bridge(e.clone()))
            } else {
                self.run_case(suite, case).await
            };

            cases.push(CaseReport {
                description: case.description.clone(),
                outcome,
            });
        }

        self.sdk.dispose().await;

        SuiteReport {
            method: suite.method.clone(),
            setup_error,
            cases,
        }
    }

    async fn prepare_suite(&mut self, suite: &FixtureSuite) -> Result<(), BridgeError> {
        let mut options = self.options.controller.clone();
        options.name = suite.method.clone();
        self.session
            .ensure_controller(self.connector.as_ref(), &options)
            .await?;
        self.phase = Phase::ControllerReady;

        if suite_needs_setup(&suite.setup, self.session.current_mnemonic()) {
            self.session.apply_setup(&suite.setup).await?;
        }

        self.sdk.init(&options).await?;
        let features = self.sdk.get_features().await.payload.unwrap_or(Value::Null);
        info!("Setup finished. Running tests against device: {}", features);
        self.phase = Phase::SeedReady;
        Ok(())
    }

    pub async fn run_case(&mut self, suite: &FixtureSuite, case: &FixtureCase) -> CaseOutcome {
        if !self.session.has_controller() {
            return CaseOutcome::Failed(CaseFailure::ControllerMissing);
        }

        self.phase = Phase::RunningCase;
        info!("{}: {}", suite.method, case.description);

        let limit = case.timeout().unwrap_or(self.options.case_timeout);
        let outcome = match tokio::time::timeout(limit, self.execute_case(suite, case)).await {
            Ok(Ok(())) => CaseOutcome::Passed,
            Ok(Err(failure)) => CaseOutcome::Failed(failure),
            Err(_) => CaseOutcome::Failed(CaseFailure::TimedOut(limit)),
        };

        self.session.settle().await;
        match &outcome {
            CaseOutcome::Failed(failure) => warn!("{} failed: {}", case.description, failure),
            _ => info!("{} passed", case.description),
        }
        outcome
    }

    async fn execute_case(&mut self, suite: &FixtureSuite, case: &FixtureCase) -> Result<(), CaseFailure> {
        if let Some(setup) = case_setup(&suite.setup, case, self.session.current_mnemonic()) {
            self.session
                .apply_setup(&setup)
                .await
                .map_err(CaseFailure::Bridge)?;
        }

        let controller = self
            .session
            .controller_mut()
            .ok_or(CaseFailure::ControllerMissing)?;
        controller.set_name(case.description.clone());

        let response = self.sdk.call(&suite.method, &case.params).await;
        let actual = serde_json::to_value(&response)
            .map_err(|e| CaseFailure::Bridge(BridgeError::from(e)))?;

        let expected = resolve(case, &self.env).to_value();
        match_subset(&expected, &actual).map_err(CaseFailure::Mismatch)
    }

    /// Releases the controller and the cache server exactly once
    pub async fn teardown(&mut self) {
        if self.phase == Phase::TornDown {
            return;
        }

        self.session.release().await;
        if let Some(mut server) = self.cache_server.take() {
            server.close().await;
        }
        self.phase = Phase::TornDown;
        info!("Orchestrator torn down");
    }
}
