//! Coin definitions rewrite
//!
//! The SDK reads backend URLs from its coin definitions. When the websocket
//! cache is on, every blockbook backend is pointed at the local cache server.

use serde_json::Value;

use crate::errors::BridgeResult;

/// Points every blockbook backend at `endpoint`. Pure: same input, same output.
pub fn transform_coins_json(mut coins: Value, endpoint: &str) -> Value {
    if let Value::Object(groups) = &mut coins {
        for coin in groups.values_mut().filter_map(Value::as_array_mut).flatten() {
            let Some(link) = coin.get_mut("blockchain_link").and_then(Value::as_object_mut) else {
                continue;
            };
            if link.get("type").and_then(Value::as_str) == Some("blockbook") {
                link.insert(
                    "url".to_string(),
                    Value::Array(vec![Value::String(endpoint.to_string())]),
                );
            }
        }
    }
    coins
}

/// Returns `content` untouched unless `enabled`; otherwise parse, transform, serialize.
pub fn preprocess_coins_json(content: &str, enabled: bool, endpoint: &str) -> BridgeResult<String> {
    if !enabled {
        return Ok(content.to_string());
    }

    let parsed: Value = serde_json::from_str(content)?;
    tracing::info!("Processing coins.json for {}", endpoint);
    Ok(serde_json::to_string(&transform_coins_json(parsed, endpoint))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_blockbook_links_rewritten() {
        let coins = json!({
            "bitcoin": [
                { "shortcut": "BTC", "blockchain_link": { "type": "blockbook", "url": ["https://btc1.trezor.io"] } },
                { "shortcut": "XYZ" }
            ],
            "misc": [
                { "shortcut": "XRP", "blockchain_link": { "type": "ripple", "url": ["wss://s1.ripple.com"] } }
            ]
        });

        let out = transform_coins_json(coins, "ws://127.0.0.1:18088");
        assert_eq!(out["bitcoin"][0]["blockchain_link"]["url"], json!(["ws://127.0.0.1:18088"]));
        assert_eq!(out["bitcoin"][1], json!({ "shortcut": "XYZ" }));
        assert_eq!(out["misc"][0]["blockchain_link"]["url"], json!(["wss://s1.ripple.com"]));
    }

    #[test]
    fn test_disabled_passthrough() {
        let raw = "{ \"bitcoin\": [] }";
        assert_eq!(preprocess_coins_json(raw, false, "ws://x").unwrap(), raw);
    }
}
