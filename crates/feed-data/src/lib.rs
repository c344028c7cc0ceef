//! 캐시, 업스트림 제공자, 요청 한도 및 폴백 체인.
//!
//! 이 crate는 다음을 제공합니다:
//! - Redis / 메모리 캐시 저장소
//! - Yahoo Finance(주) / Alpha Vantage(보조) 제공자
//! - 제공자별 고정 윈도우 요청 한도
//! - cache-aside 조회와 폴백 체인을 묶은 [`FeedService`]

pub mod error;
pub mod provider;
pub mod rate_limiter;
pub mod service;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::{
    AlphaVantageProvider, FeedRecord, MarketDataProvider, ProviderResult, YahooProvider,
};
pub use rate_limiter::{
    FixedWindowLimiter, RateLimitDecision, RateLimitPolicy, RateLimiterStats, WindowUsage,
};
pub use service::{BatchResult, DataSource, FeedService, FeedServiceBuilder, ProviderSlot};
pub use storage::{
    fresh_key, stale_key, CacheStats, CacheStore, MemoryCache, MetricsCache, RedisCache,
};
