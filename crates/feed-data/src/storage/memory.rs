//! 프로세스 내 메모리 캐시.
//!
//! Redis가 비활성화된 경우와 테스트에서 사용합니다. 만료 시각은
//! `tokio::time::Instant` 기준이라 일시정지된 테스트 시계를 따릅니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::CacheStore;
use crate::error::Result;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// 만료 시간을 지원하는 메모리 캐시.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 만료되지 않은 항목 수.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 만료된 항목을 제거하고 제거된 수를 반환합니다.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| (e.expires_at - now).as_secs_f64().ceil() as u64))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache.set_raw("k", "v".to_string(), 300).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get_raw("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.ttl("k").await.unwrap(), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get_raw("k").await.unwrap().is_none());
        assert!(cache.ttl("k").await.unwrap().is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let cache = MemoryCache::new();
        cache.set_raw("k", "a".to_string(), 60).await.unwrap();
        cache.set_raw("k", "b".to_string(), 60).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap().as_deref(), Some("b"));
        assert_eq!(cache.len().await, 1);

        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
    }
}
