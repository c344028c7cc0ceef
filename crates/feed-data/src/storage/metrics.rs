//! 메트릭 추적이 포함된 캐시.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::CacheStore;
use crate::error::Result;

/// 캐시 통계.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    pub backend: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub hit_rate: f64,
}

/// JSON 직렬화와 hit/miss 추적을 담당하는 캐시 래퍼.
pub struct MetricsCache {
    store: Arc<dyn CacheStore>,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl MetricsCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// 값을 가져옵니다.
    ///
    /// 역직렬화할 수 없는 항목은 미스로 취급합니다.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = self.store.get_raw(key).await.inspect_err(|_| {
            self.errors.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("feed_cache_errors_total").increment(1);
        })?;

        let parsed = raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "손상된 캐시 항목 무시");
                None
            }
        });

        if parsed.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("feed_cache_hits_total").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("feed_cache_misses_total").increment(1);
        }
        Ok(parsed)
    }

    /// TTL과 함께 값을 저장합니다.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store
            .set_raw(key, json, ttl_secs)
            .await
            .inspect_err(|_| {
                self.errors.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("feed_cache_errors_total").increment(1);
            })
    }

    /// 남은 TTL(초).
    pub async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        self.store.ttl(key).await
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await.unwrap_or(false)
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// 캐시 통계를 가져옵니다.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            backend: self.store.backend(),
            hits,
            misses,
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate,
        }
    }

    /// 내부 저장소를 가져옵니다.
    pub fn inner(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }
}
