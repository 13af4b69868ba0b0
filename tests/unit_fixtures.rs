use anyhow::Result;
use fixture_bridge::fixtures::{expected_payload, DeviceSetup, FixtureSuite};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

/// Unit tests for fixture parsing

fn sample_suite(method: &str) -> Value {
    json!({
        "method": method,
        "setup": { "mnemonic": "mnemonic_all", "pin": "1234", "passphrase_protection": false },
        "tests": [
            {
                "description": "first account",
                "params": { "path": "m/44'/0'/0'/0/0" },
                "result": { "address": "1JAd7XCBzGudGpJQSDSfpmJhiygtLQWaGL" },
                "skip": ["1", { "type": "flag", "name": "btc-only", "value": "true" }]
            },
            {
                "description": "case seed",
                "params": {},
                "mnemonic": "mnemonic_12",
                "result": false
            }
        ]
    })
}

#[test]
fn test_parse_suite() -> Result<()> {
    let suite = FixtureSuite::from_json_str(&sample_suite("getAddress").to_string())?;

    assert_eq!(suite.method, "getAddress");
    assert_eq!(suite.setup.mnemonic.as_deref(), Some("mnemonic_all"));
    assert_eq!(suite.setup.pin.as_deref(), Some("1234"));
    assert_eq!(suite.setup.passphrase_protection, Some(false));
    assert_eq!(suite.tests.len(), 2);
    assert_eq!(suite.tests[0].skip.0.len(), 2);
    assert_eq!(suite.tests[1].mnemonic.as_deref(), Some("mnemonic_12"));
    assert_eq!(expected_payload(suite.tests[1].result.as_ref()), None);
    Ok(())
}

#[test]
fn test_setup_keeps_unknown_options() -> Result<()> {
    let setup: DeviceSetup = serde_json::from_value(json!({
        "mnemonic": "mnemonic_all",
        "backup_type": 1
    }))?;

    assert_eq!(setup.extra["backup_type"], 1);
    assert_eq!(
        serde_json::to_value(&setup)?,
        json!({ "mnemonic": "mnemonic_all", "backup_type": 1 })
    );
    Ok(())
}

#[test]
fn test_load_file_single_and_array() -> Result<()> {
    let mut single = NamedTempFile::new()?;
    write!(single, "{}", sample_suite("getAddress"))?;
    let suites = FixtureSuite::load_file(single.path())?;
    assert_eq!(suites.len(), 1);

    let mut many = NamedTempFile::new()?;
    write!(many, "{}", json!([sample_suite("getAddress"), sample_suite("getPublicKey")]))?;
    let suites = FixtureSuite::load_file(many.path())?;
    assert_eq!(
        suites.iter().map(|s| s.method.as_str()).collect::<Vec<_>>(),
        vec!["getAddress", "getPublicKey"]
    );

    let mut invalid = NamedTempFile::new()?;
    write!(invalid, "42")?;
    assert!(FixtureSuite::load_file(invalid.path()).is_err());
    Ok(())
}

#[test]
fn test_expected_payload() {
    let payload = json!({ "a": 1 });
    assert_eq!(expected_payload(Some(&payload)), Some(&payload));
    assert_eq!(expected_payload(Some(&Value::Null)), None);
    assert_eq!(expected_payload(Some(&Value::Bool(false))), None);
    assert_eq!(expected_payload(None), None);
}
