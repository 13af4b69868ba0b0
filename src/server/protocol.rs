//! Blockchain backend frames answered by the cache server
//!
//! Requests look like `{"id": "3", "method": "getTransaction", "params": {"txid": ".."}}`,
//! replies like `{"id": "3", "data": ..}`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::cache::CacheSubstitutionGate;

#[derive(Debug, Deserialize)]
pub struct BackendRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl BackendRequest {
    /// Cache key for this request.
    ///
    /// Transactions are keyed by txid, everything else by method name plus
    /// canonical params when there are any.
    pub fn cache_key(&self) -> String {
        if self.method == "getTransaction" {
            if let Some(txid) = self.params.get("txid").and_then(Value::as_str) {
                return txid.to_string();
            }
        }

        match &self.params {
            Value::Null => self.method.clone(),
            Value::Object(map) if map.is_empty() => self.method.clone(),
            // Map is ordered by key, so the text is canonical
            params => format!("{}:{}", self.method, params),
        }
    }
}

/// Answers one raw frame; never fails, errors go back in the blockbook error shape
pub fn respond(gate: &CacheSubstitutionGate, raw: &str) -> String {
    let request: BackendRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => return reply(&Value::Null, error_data(&format!("Invalid request: {}", e))),
    };

    let data = match request.method.as_str() {
        "ping" => json!({}),
        m if m.starts_with("subscribe") => json!({ "subscribed": true }),
        m if m.starts_with("unsubscribe") => json!({ "subscribed": false }),
        _ => {
            let key = request.cache_key();
            match gate.lookup_one(&key, true) {
                Some(data) => data,
                None => {
                    tracing::warn!("No cached response for {} ({})", request.method, key);
                    error_data(&format!("No cached response for {}", key))
                }
            }
        }
    };

    reply(&request.id, data)
}

fn reply(id: &Value, data: Value) -> String {
    json!({ "id": id, "data": data }).to_string()
}

fn error_data(message: &str) -> Value {
    json!({ "error": { "message": message } })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: Value) -> BackendRequest {
        BackendRequest {
            id: json!("1"),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(request("getTransaction", json!({ "txid": "ab" })).cache_key(), "ab");
        assert_eq!(request("getInfo", json!({})).cache_key(), "getInfo");
        assert_eq!(request("getInfo", Value::Null).cache_key(), "getInfo");
        assert_eq!(
            request("estimateFee", json!({ "blocks": [1, 2, 10] })).cache_key(),
            "estimateFee:{\"blocks\":[1,2,10]}"
        );
        assert_eq!(
            request("estimateSmartFee", json!({ "mode": "economy", "blocks": 2 })).cache_key(),
            request("estimateSmartFee", json!({ "blocks": 2, "mode": "economy" })).cache_key()
        );
    }
}
