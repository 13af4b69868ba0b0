use anyhow::Result;
use fixture_bridge::cache::{preprocess_coins_json, transform_coins_json, CacheSubstitutionGate, ResultCache};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Unit tests for the cache substitution layer

fn sample_cache() -> Arc<ResultCache> {
    Arc::new(ResultCache::from_entries(vec![
        ("tx_a", json!({ "txid": "tx_a", "version": 1 })),
        ("tx_b", json!({ "txid": "tx_b", "version": 2 })),
    ]))
}

#[test]
fn test_gate_preserves_order_and_length() {
    let gate = CacheSubstitutionGate::new(sample_cache(), true);

    let out = gate.lookup(&["tx_b", "missing", "tx_a", "tx_b"], false);

    assert_eq!(out.len(), 4);
    assert_eq!(out[0].as_ref().unwrap()["txid"], "tx_b");
    assert!(out[1].is_none());
    assert_eq!(out[2].as_ref().unwrap()["txid"], "tx_a");
    assert_eq!(out[3].as_ref().unwrap()["txid"], "tx_b");
}

#[test]
fn test_gate_disabled_returns_empty() {
    let gate = CacheSubstitutionGate::new(sample_cache(), false);

    assert!(gate.lookup(&["tx_a", "tx_b"], false).is_empty());
    assert!(gate.lookup::<&str>(&[], false).is_empty());
    assert_eq!(gate.stats().bypassed, 2);
    assert_eq!(gate.stats().hits, 0);
}

#[test]
fn test_gate_force_bypasses_disabled_flag() {
    let gate = CacheSubstitutionGate::new(sample_cache(), false);

    let out = gate.lookup(&["tx_a", "nope"], true);

    assert_eq!(out.len(), 2);
    assert!(out[0].is_some());
    assert!(out[1].is_none());
    assert_eq!(gate.lookup_one("tx_b", true).unwrap()["version"], 2);
    assert_eq!(gate.lookup_one("tx_b", false), None);
}

#[test]
fn test_gate_stats() {
    let gate = CacheSubstitutionGate::new(sample_cache(), true);

    gate.lookup(&["tx_a", "x", "y", "tx_b"], false);
    let stats = gate.stats();

    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hit_rate, 0.5);
}

#[test]
fn test_duplicate_keys_last_write_wins() {
    let cache = ResultCache::from_entries(vec![("k", json!(1)), ("k", json!(2))]);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("k"), Some(&json!(2)));

    let parsed = ResultCache::from_json_str(r#"{ "k": 1, "k": 3 }"#).unwrap();
    assert_eq!(parsed.get("k"), Some(&json!(3)));
}

#[test]
fn test_dataset_must_be_object() {
    assert!(ResultCache::from_json_str("[1, 2]").is_err());
    assert!(ResultCache::from_json_str("not json").is_err());
}

#[test]
fn test_bundled_dataset() {
    let cache = ResultCache::bundled();

    assert!(!cache.is_empty());
    assert!(cache.get("getInfo").is_some());
    assert!(Arc::ptr_eq(&cache, &ResultCache::bundled()));
}

#[test]
fn test_load_dataset_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{}", json!({ "abc": { "hex": "00" } }))?;

    let cache = ResultCache::load(file.path())?;

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("abc").unwrap()["hex"], "00");
    Ok(())
}

#[test]
fn test_render_script_embeds_dataset_and_flag() {
    let gate = CacheSubstitutionGate::new(sample_cache(), false);
    let script = gate.render_script();

    assert!(script.starts_with("const CACHE = {\"tx_a\":"));
    assert!(script.contains("const TESTS_USE_TX_CACHE = false;"));
    assert!(script.contains("TestUtils.TX_CACHE = (txs, force = false)"));

    // Stable across calls regardless of hash map ordering
    assert_eq!(script, gate.render_script());
}

#[test]
fn test_coins_transform_is_deterministic() -> Result<()> {
    let raw = json!({
        "bitcoin": [
            { "name": "Bitcoin", "blockchain_link": { "type": "blockbook", "url": ["https://btc1.trezor.io", "https://btc2.trezor.io"] } },
            { "name": "Testnet", "blockchain_link": { "type": "blockbook", "url": ["https://tbtc1.trezor.io"] } }
        ],
        "eth": [
            { "name": "Ethereum", "blockchain_link": { "type": "blockbook", "url": ["https://eth1.trezor.io"] } }
        ],
        "misc": []
    })
    .to_string();

    let first = preprocess_coins_json(&raw, true, "ws://localhost:18088")?;
    let second = preprocess_coins_json(&raw, true, "ws://localhost:18088")?;
    assert_eq!(first, second);

    let parsed: Value = serde_json::from_str(&first)?;
    assert_eq!(parsed["bitcoin"][0]["blockchain_link"]["url"], json!(["ws://localhost:18088"]));
    assert_eq!(parsed["eth"][0]["blockchain_link"]["url"], json!(["ws://localhost:18088"]));
    assert_eq!(parsed, transform_coins_json(serde_json::from_str(&raw)?, "ws://localhost:18088"));
    Ok(())
}

#[test]
fn test_coins_preprocess_rejects_invalid_json_when_enabled() {
    assert!(preprocess_coins_json("{", true, "ws://x").is_err());
    assert_eq!(preprocess_coins_json("{", false, "ws://x").unwrap(), "{");
}
