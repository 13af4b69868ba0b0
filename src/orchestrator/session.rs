//! Session state: the one controller of a run and the seed it has loaded

use tracing::{info, warn};

use crate::controller::{Connector, ControllerOptions, DeviceController};
use crate::errors::{BridgeError, BridgeResult};
use crate::fixtures::{DeviceSetup, FixtureCase};

#[derive(Default)]
pub struct SessionState {
    controller: Option<DeviceController>,
    current_mnemonic: Option<String>,
    setup_calls: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(&self) -> Option<&DeviceController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut DeviceController> {
        self.controller.as_mut()
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    pub fn current_mnemonic(&self) -> Option<&str> {
        self.current_mnemonic.as_deref()
    }

    /// Setup requests issued so far
    pub fn setup_calls(&self) -> usize {
        self.setup_calls
    }

    /// Connects only when no controller is alive
    pub async fn ensure_controller(
        &mut self,
        connector: &dyn Connector,
        options: &ControllerOptions,
    ) -> BridgeResult<&mut DeviceController> {
        if self.controller.is_none() {
            let controller = DeviceController::connect(connector, options.clone()).await?;
            self.controller = Some(controller);
        }

        self.controller
            .as_mut()
            .ok_or_else(|| BridgeError::connection("controller not found"))
    }

    /// Loads `setup` and records its mnemonic once the device acknowledged it
    pub async fn apply_setup(&mut self, setup: &DeviceSetup) -> BridgeResult<()> {
        let Some(controller) = self.controller.as_mut() else {
            return Err(BridgeError::connection("controller not found"));
        };

        // Unknown until the device confirms
        self.current_mnemonic = None;
        self.setup_calls += 1;

        let result = controller.setup(setup).await;
        match &result {
            Ok(()) => {
                self.current_mnemonic = setup.mnemonic.clone();
                info!("Device seed switched");
            }
            Err(e) => warn!("Device setup failed: {}", e),
        }

        self.settle().await;
        result
    }

    /// Drops the controller if its connection is gone
    pub async fn settle(&mut self) {
        let lost = self
            .controller
            .as_ref()
            .map(|c| !c.is_connected())
            .unwrap_or(false);

        if lost {
            if let Some(mut controller) = self.controller.take() {
                if let Some(event) = controller.take_event() {
                    warn!("Controller dropped after {:?}", event);
                }
                controller.dispose().await;
            }
            self.current_mnemonic = None;
        }
    }

    /// Disposes the controller. Safe to call more than once.
    pub async fn release(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.dispose().await;
        }
        self.current_mnemonic = None;
    }
}

/// Whether the suite-level setup has to run
pub fn suite_needs_setup(suite_setup: &DeviceSetup, current: Option<&str>) -> bool {
    match suite_setup.mnemonic.as_deref() {
        Some(mnemonic) => Some(mnemonic) != current,
        None => false,
    }
}

/// Setup to apply before a case, if any.
///
/// A case seed different from the current one is loaded for that case only.
/// A case without its own seed restores the suite setup whenever the loaded
/// seed differs from it, including a suite that declares no seed at all.
pub fn case_setup(
    suite_setup: &DeviceSetup,
    case: &FixtureCase,
    current: Option<&str>,
) -> Option<DeviceSetup> {
    match case.mnemonic.as_deref() {
        Some(mnemonic) if Some(mnemonic) != current => Some(DeviceSetup::with_mnemonic(mnemonic)),
        Some(_) => None,
        None if suite_setup.mnemonic.as_deref() != current => Some(suite_setup.clone()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const M1: &str = "all all all all all all all all all all all all";
    const M2: &str = "alcohol woman abuse must during monitor noble actual mixed trade anger aisle";

    #[test]
    fn test_suite_setup_only_with_seed() {
        assert!(suite_needs_setup(&DeviceSetup::with_mnemonic(M1), None));
        assert!(suite_needs_setup(&DeviceSetup::with_mnemonic(M1), Some(M2)));
        assert!(!suite_needs_setup(&DeviceSetup::with_mnemonic(M1), Some(M1)));
        assert!(!suite_needs_setup(&DeviceSetup::default(), Some(M1)));
    }

    #[test]
    fn test_case_setup() {
        let plain = FixtureCase::new("plain", json!({}));
        let seeded = FixtureCase::new("seeded", json!({})).with_mnemonic(M2);
        let suite = DeviceSetup::with_mnemonic(M1);

        assert_eq!(case_setup(&suite, &seeded, Some(M1)), Some(DeviceSetup::with_mnemonic(M2)));
        assert_eq!(case_setup(&suite, &seeded, Some(M2)), None);
        assert_eq!(case_setup(&suite, &plain, Some(M2)), Some(suite.clone()));
        assert_eq!(case_setup(&suite, &plain, Some(M1)), None);

        // A seedless suite is restored after a case loaded its own seed
        let seedless = DeviceSetup::default();
        assert_eq!(case_setup(&seedless, &plain, Some(M2)), Some(DeviceSetup::default()));
        assert_eq!(case_setup(&seedless, &plain, None), None);
    }
}
