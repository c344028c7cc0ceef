//! 메모리 캐시 만료 항목 정리 태스크.
//!
//! Redis는 TTL로 항목을 스스로 제거하지만 메모리 캐시는 조회 시에만
//! 만료를 확인하므로, 다시 조회되지 않는 항목이 남지 않도록 주기적으로 비웁니다.

use std::sync::Arc;
use std::time::Duration;

use feed_data::MemoryCache;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 기본 정리 주기.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// 정리 태스크를 시작합니다.
///
/// `shutdown`이 취소되면 태스크가 종료됩니다.
pub fn start_cache_janitor(
    cache: Arc<MemoryCache>,
    purge_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = purge_interval.as_secs(),
            "메모리 캐시 정리 태스크 시작"
        );

        let mut ticker = interval(purge_interval);
        ticker.tick().await; // 첫 tick은 즉시 완료됨

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.purge_expired().await;
                    if removed > 0 {
                        debug!(removed, "만료된 캐시 항목 정리");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("메모리 캐시 정리 태스크: 종료 시그널 수신");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_data::CacheStore;

    #[tokio::test(start_paused = true)]
    async fn test_janitor_purges_expired_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_raw("feed:context:yahoo:^GSPC", "{}".to_string(), 30).await.unwrap();
        cache.set_raw("feed:stale:context:^GSPC", "{}".to_string(), 600).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = start_cache_janitor(cache.clone(), Duration::from_secs(60), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.len().await, 1);
        // 만료 항목은 이미 정리됨
        assert_eq!(cache.purge_expired().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_janitor_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let handle = start_cache_janitor(
            Arc::new(MemoryCache::new()),
            Duration::from_secs(3_600),
            shutdown.clone(),
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
