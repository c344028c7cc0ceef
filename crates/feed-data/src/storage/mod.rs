//! 캐시 저장소.
//!
//! - [`RedisCache`]: 운영용 Redis 저장소
//! - [`MemoryCache`]: Redis 비활성 시 및 테스트용 프로세스 내 저장소
//! - [`MetricsCache`]: JSON 직렬화와 hit/miss 추적을 담당하는 래퍼
//!
//! # 키 형식
//!
//! - 신선한 항목: `feed:{kind}:{provider}:{symbol}` (데이터 종류별 TTL)
//! - 마지막 정상 사본: `feed:stale:{kind}:{symbol}` (폴백 체인 전용)

pub mod memory;
pub mod metrics;
pub mod redis;

use async_trait::async_trait;
use feed_core::DataKind;

use crate::error::Result;

pub use self::memory::MemoryCache;
pub use self::metrics::{CacheStats, MetricsCache};
pub use self::redis::RedisCache;

/// 문자열 키/값 캐시 저장소.
///
/// 값은 직렬화된 JSON이며, 모든 항목은 만료 시간을 가집니다.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 백엔드 이름 (상태 응답용).
    fn backend(&self) -> &'static str;

    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// TTL(초)과 함께 값을 저장합니다.
    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// 남은 TTL(초). 키가 없으면 `None`.
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;

    /// 저장소 상태를 확인합니다.
    async fn health_check(&self) -> Result<bool>;
}

/// 신선한 캐시 항목 키.
pub fn fresh_key(kind: DataKind, provider: &str, symbol: &str) -> String {
    format!("feed:{}:{}:{}", kind, provider, symbol)
}

/// 마지막 정상 사본 키.
pub fn stale_key(kind: DataKind, symbol: &str) -> String {
    format!("feed:stale:{}:{}", kind, symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(
            fresh_key(DataKind::Context, "yahoo", "^GSPC"),
            "feed:context:yahoo:^GSPC"
        );
        assert_eq!(
            stale_key(DataKind::Fundamentals, "RELIANCE.NS"),
            "feed:stale:fundamentals:RELIANCE.NS"
        );
    }
}
