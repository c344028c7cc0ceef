//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use std::sync::Arc;

use feed_core::AppConfig;
use feed_data::FeedService;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// cache-aside + 폴백 체인 서비스
    pub service: Arc<FeedService>,

    /// 글로벌 컨텍스트 심볼 (정규화됨)
    pub context_symbols: Vec<String>,

    /// 헬스 체크에 노출되는 서비스 이름
    pub service_name: String,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(service: Arc<FeedService>, config: &AppConfig) -> Self {
        Self {
            service,
            context_symbols: config.global_context.symbol_list(),
            service_name: config.server.service_name.clone(),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// 주 제공자(Yahoo Finance) 사용 가능 여부.
    pub fn yahoo_available(&self) -> bool {
        self.service.has_primary()
    }

    /// 보조 제공자(Alpha Vantage) 설정 여부.
    pub fn alpha_vantage_available(&self) -> bool {
        self.service.has_secondary()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use test_support::{create_test_state, create_test_state_with, ProviderMode, StaticProvider};

#[cfg(any(test, feature = "test-utils"))]
mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use feed_core::{AppConfig, FundamentalsRecord, Quote};
    use feed_data::{
        DataError, FeedService, MarketDataProvider, MemoryCache, MetricsCache, ProviderResult,
        ProviderSlot, RateLimitPolicy,
    };

    use super::AppState;

    /// 테스트용 제공자 상태.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ProviderMode {
        Up,
        Down,
        RateLimited,
    }

    /// 고정 가격표로 응답하는 테스트용 제공자.
    ///
    /// 가격표에 없는 심볼은 결과에서 빠지고, 가격표가 비어 있으면
    /// 업스트림 장애로 응답합니다.
    pub struct StaticProvider {
        name: &'static str,
        prices: HashMap<String, f64>,
        /// 요청 심볼 → 대체 심볼
        proxies: HashMap<String, String>,
        mode: Mutex<ProviderMode>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        pub fn new(name: &'static str, prices: &[(&str, f64)]) -> Arc<Self> {
            Self::with_proxies(name, prices, &[])
        }

        /// 일부 심볼을 대체 심볼 시세로 응답하는 제공자.
        pub fn with_proxies(
            name: &'static str,
            prices: &[(&str, f64)],
            proxies: &[(&str, &str)],
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
                proxies: proxies
                    .iter()
                    .map(|(s, proxy)| (s.to_string(), proxy.to_string()))
                    .collect(),
                mode: Mutex::new(ProviderMode::Up),
                calls: AtomicUsize::new(0),
            })
        }

        /// 항상 실패하는 제공자.
        pub fn down(name: &'static str) -> Arc<Self> {
            Self::new(name, &[])
        }

        /// 배치 호출 횟수.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn set_mode(&self, mode: ProviderMode) {
            if let Ok(mut current) = self.mode.lock() {
                *current = mode;
            }
        }

        fn lookup(&self, symbols: &[String]) -> Result<HashMap<String, f64>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mode = self.mode.lock().map(|m| *m).unwrap_or(ProviderMode::Down);
            match mode {
                ProviderMode::Down => {
                    return Err(DataError::FetchError(format!("{} unavailable", self.name)))
                }
                ProviderMode::RateLimited => {
                    return Err(DataError::RateLimited(format!("{}: 429", self.name)))
                }
                ProviderMode::Up if self.prices.is_empty() => {
                    return Err(DataError::FetchError(format!("{} unavailable", self.name)))
                }
                ProviderMode::Up => {}
            }
            Ok(symbols
                .iter()
                .filter_map(|s| self.prices.get(s).map(|p| (s.clone(), *p)))
                .collect())
        }
    }

    #[async_trait]
    impl MarketDataProvider for StaticProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_quotes(&self, symbols: &[String]) -> ProviderResult<Quote> {
            Ok(self
                .lookup(symbols)?
                .into_iter()
                .map(|(s, p)| {
                    let mut quote = Quote::new(s.clone(), p, Utc::now()).with_change_percent(0.5);
                    if let Some(proxy) = self.proxies.get(&s) {
                        quote = quote.with_proxy_symbol(proxy.clone());
                    }
                    (s, quote)
                })
                .collect())
        }

        async fn fetch_fundamentals(&self, symbols: &[String]) -> ProviderResult<FundamentalsRecord> {
            Ok(self
                .lookup(symbols)?
                .into_iter()
                .map(|(s, p)| {
                    let record = FundamentalsRecord {
                        market_cap: Some(p * 1_000_000.0),
                        pe_ratio: Some(p / 10.0),
                        ..FundamentalsRecord::empty(s.clone())
                    };
                    (s, record)
                })
                .collect())
        }
    }

    fn slot(provider: Arc<StaticProvider>) -> ProviderSlot {
        ProviderSlot::new(provider, RateLimitPolicy::per_minute(100), Duration::from_secs(5))
    }

    /// 메모리 캐시와 주어진 제공자로 상태를 만듭니다.
    pub fn create_test_state_with(
        primary: Arc<StaticProvider>,
        secondary: Option<Arc<StaticProvider>>,
    ) -> AppState {
        let config = AppConfig::default();
        let cache = Arc::new(MetricsCache::new(Arc::new(MemoryCache::new())));
        let service = FeedService::builder(cache)
            .primary(slot(primary))
            .secondary(secondary.map(slot))
            .ttls(config.ttls())
            .retry_after_secs(config.fallback.retry_after_secs)
            .build();

        AppState::new(Arc::new(service), &config)
    }

    /// 기본 컨텍스트 심볼을 모두 제공하는 Yahoo 대역 상태.
    pub fn create_test_state() -> AppState {
        let primary = StaticProvider::new(
            "yahoo",
            &[
                ("^GSPC", 5_000.0),
                ("^IXIC", 16_000.0),
                ("^DJI", 38_000.0),
                ("^VIX", 14.2),
                ("GC=F", 2_050.0),
                ("USDINR=X", 83.1),
                ("CL=F", 78.4),
                ("^N225", 36_000.0),
                ("^HSI", 16_500.0),
                ("AAPL", 190.0),
                ("MSFT", 410.0),
            ],
        );
        create_test_state_with(primary, None)
    }
}
