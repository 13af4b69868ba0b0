use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{CacheStats, ResultCache};

/// Decides per request whether cached data is served.
///
/// With the cache disabled and no `force`, every lookup yields an empty
/// result. Otherwise each key maps to its cached value or `None`; a miss is
/// never an error and never replaced by synthetic data.
pub struct CacheSubstitutionGate {
    cache: Arc<ResultCache>,
    use_cache: bool,
    monitoring_enabled: bool,
    stats: Mutex<CacheStats>,
}

impl CacheSubstitutionGate {
    pub fn new(cache: Arc<ResultCache>, use_cache: bool) -> Self {
        Self {
            cache,
            use_cache,
            monitoring_enabled: false,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Emits a sentry breadcrumb per hit and miss
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitoring_enabled = enabled;
        self
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Output position `i` answers `keys[i]`.
    pub fn lookup<K: AsRef<str>>(&self, keys: &[K], force: bool) -> Vec<Option<Value>> {
        if !self.use_cache && !force {
            self.stats.lock().record_bypass();
            debug!("Cache disabled, skipping lookup of {} keys", keys.len());
            return Vec::new();
        }

        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                let value = self.cache.get(key).cloned();
                self.record(key, value.is_some());
                value
            })
            .collect()
    }

    /// Single key lookup with the same policy as [`lookup`](Self::lookup)
    pub fn lookup_one(&self, key: &str, force: bool) -> Option<Value> {
        self.lookup(&[key], force).into_iter().next().flatten()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Script prelude for runners without filesystem access.
    ///
    /// Embeds the dataset, the flag and a `TX_CACHE(txs, force)` accessor
    /// that applies the same empty-result policy as [`lookup`](Self::lookup).
    pub fn render_script(&self) -> String {
        format!(
            "const CACHE = {};\n\
             const TESTS_USE_TX_CACHE = {};\n\
             TestUtils.TX_CACHE = (txs, force = false) => {{ if (TESTS_USE_TX_CACHE === false && !force) return []; return txs.map(hash => CACHE[hash]); }};\n",
            self.cache.to_literal(),
            self.use_cache
        )
    }

    fn record(&self, key: &str, hit: bool) {
        {
            let mut stats = self.stats.lock();
            if hit {
                stats.record_hit();
            } else {
                stats.record_miss();
            }
        }

        if self.monitoring_enabled {
            sentry::add_breadcrumb(sentry::Breadcrumb {
                message: Some(format!(
                    "Cache {}: {}",
                    if hit { "hit" } else { "miss" },
                    key
                )),
                category: Some("cache".into()),
                level: sentry::Level::Debug,
                ..Default::default()
            });
        }
    }
}
