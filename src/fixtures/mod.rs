//! Fixture suites
//!
//! A suite names one device command and lists the cases to run against it.
//! Fixtures are read-only for the whole run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

use crate::errors::{BridgeError, BridgeResult};
use crate::rules::RuleSet;

/// Device configuration loaded before a suite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSetup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase_protection: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_backup: Option<bool>,

    /// Remaining device options, forwarded as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceSetup {
    pub fn with_mnemonic(mnemonic: impl Into<String>) -> Self {
        Self {
            mnemonic: Some(mnemonic.into()),
            ..Default::default()
        }
    }
}

/// Alternate expectation for environments matched by `rules`
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyResult {
    #[serde(default)]
    pub rules: RuleSet,

    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureCase {
    pub description: String,

    #[serde(default)]
    pub params: Value,

    /// Expected success payload; absent, `null` or `false` expects a failure
    #[serde(default)]
    pub result: Option<Value>,

    /// Seed required by this case only
    #[serde(default)]
    pub mnemonic: Option<String>,

    #[serde(default)]
    pub skip: RuleSet,

    #[serde(default)]
    pub legacy_results: Vec<LegacyResult>,

    /// Milliseconds
    #[serde(default)]
    pub custom_timeout: Option<u64>,
}

impl FixtureCase {
    pub fn new(description: impl Into<String>, params: Value) -> Self {
        Self {
            description: description.into(),
            params,
            result: None,
            mnemonic: None,
            skip: RuleSet::default(),
            legacy_results: Vec::new(),
            custom_timeout: None,
        }
    }

    pub fn expecting(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        self.mnemonic = Some(mnemonic.into());
        self
    }

    pub fn with_legacy(mut self, rules: RuleSet, payload: Option<Value>) -> Self {
        self.legacy_results.push(LegacyResult { rules, payload });
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.custom_timeout.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSuite {
    pub method: String,

    #[serde(default)]
    pub setup: DeviceSetup,

    #[serde(default)]
    pub tests: Vec<FixtureCase>,
}

impl FixtureSuite {
    pub fn from_json_str(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a file holding either one suite or an array of suites
    pub fn load_file(path: &Path) -> BridgeResult<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;

        match value {
            Value::Array(_) => Ok(serde_json::from_value(value)?),
            Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
            _ => Err(BridgeError::Parse {
                message: format!("{:?}: expected a fixture object or array", path),
            }),
        }
    }
}

/// `null` and `false` mark an expected failure in fixture files
pub fn expected_payload(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !matches!(v, Value::Null | Value::Bool(false)))
}
