//! Expected outcome resolution

pub mod matcher;

use serde_json::{json, Value};

use crate::fixtures::{expected_payload, FixtureCase};
use crate::rules::Environment;

pub use matcher::{match_subset, Mismatch};

/// What a case expects the device command to return
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedOutcome {
    Success(Value),
    Failure,
}

impl ExpectedOutcome {
    fn from_payload(payload: Option<&Value>) -> Self {
        match expected_payload(payload) {
            Some(payload) => ExpectedOutcome::Success(payload.clone()),
            None => ExpectedOutcome::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExpectedOutcome::Success(_))
    }

    /// Shape compared against the command response
    pub fn to_value(&self) -> Value {
        match self {
            ExpectedOutcome::Success(payload) => json!({ "success": true, "payload": payload }),
            ExpectedOutcome::Failure => json!({ "success": false }),
        }
    }
}

/// Folds the legacy results over the base expectation.
///
/// Every matching entry overwrites the previous outcome, so the last match
/// in declaration order wins.
pub fn resolve(case: &FixtureCase, env: &Environment) -> ExpectedOutcome {
    case.legacy_results
        .iter()
        .filter(|legacy| legacy.rules.matches(env))
        .fold(
            ExpectedOutcome::from_payload(case.result.as_ref()),
            |_, legacy| ExpectedOutcome::from_payload(legacy.payload.as_ref()),
        )
}
