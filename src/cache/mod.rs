use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{BridgeError, BridgeResult};

pub mod coins;
pub mod gate;

pub use coins::{preprocess_coins_json, transform_coins_json};
pub use gate::CacheSubstitutionGate;

/// Dane cache dołączane do binarki
const BUNDLED_DATASET: &str = include_str!("../../data/tx_cache.json");

static BUNDLED: Lazy<Arc<ResultCache>> = Lazy::new(|| {
    // Zbiór jest kuratorowany offline; błędny JSON to błąd builda danych
    let cache = ResultCache::from_json_str(BUNDLED_DATASET).unwrap_or_else(|e| {
        tracing::error!("Bundled cache dataset is invalid: {}", e);
        ResultCache::default()
    });
    Arc::new(cache)
});

/// Statyczna mapa klucz → odpowiedź, budowana raz przy starcie
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: HashMap<String, Value>,
}

/// Statystyki cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Liczba trafień
    pub hits: u64,

    /// Liczba chybień
    pub misses: u64,

    /// Zapytania odrzucone, bo cache jest wyłączony
    pub bypassed: u64,

    /// Współczynnik trafień
    pub hit_rate: f64,

    /// Ostatnia aktualizacja
    pub last_updated: i64,
}

impl ResultCache {
    /// Wbudowany zbiór danych, współdzielony w procesie
    pub fn bundled() -> Arc<ResultCache> {
        BUNDLED.clone()
    }

    /// Buduje cache z par klucz/wartość; duplikaty nadpisuje ostatni wpis
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut map = HashMap::new();
        for (key, value) in entries {
            map.insert(key.into(), value);
        }
        Self { entries: map }
    }

    /// Parsuje obiekt JSON `{ klucz: wartość }`
    pub fn from_json_str(json: &str) -> BridgeResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        match value {
            Value::Object(map) => Ok(Self::from_entries(map)),
            other => Err(BridgeError::Parse {
                message: format!("cache dataset must be a JSON object, got {}", kind(&other)),
            }),
        }
    }

    /// Ładuje zbiór danych z pliku
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let cache = Self::from_json_str(&content)?;
        info!("Loaded {} cache entries from {:?}", cache.len(), path);
        Ok(cache)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let value = self.entries.get(key);
        debug!("Cache lookup {}: {}", key, if value.is_some() { "hit" } else { "miss" });
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializuje zbiór jako literał JSON z posortowanymi kluczami
    pub fn to_literal(&self) -> String {
        let sorted: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(sorted).to_string()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            hits: 0,
            misses: 0,
            bypassed: 0,
            hit_rate: 0.0,
            last_updated: chrono::Utc::now().timestamp(),
        }
    }
}

impl CacheStats {
    /// Aktualizuje statystyki po trafieniu
    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.update_hit_rate();
    }

    /// Aktualizuje statystyki po chybieniu
    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.update_hit_rate();
    }

    pub fn record_bypass(&mut self) {
        self.bypassed += 1;
        self.last_updated = chrono::Utc::now().timestamp();
    }

    /// Aktualizuje współczynnik trafień
    fn update_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hit_rate = self.hits as f64 / total as f64;
        }
        self.last_updated = chrono::Utc::now().timestamp();
    }
}
