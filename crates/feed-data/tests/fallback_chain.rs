//! 폴백 체인 통합 테스트
//!
//! 주 제공자가 실패할 때 Alpha Vantage(mockito 서버)가 빈 자리를 채우고,
//! 두 제공자가 모두 실패하면 마지막 정상 사본이 제공되는지 확인합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feed_core::{FundamentalsRecord, Quote};
use feed_data::{
    AlphaVantageProvider, DataError, DataSource, FeedService, MarketDataProvider, MemoryCache,
    MetricsCache, ProviderResult, ProviderSlot, RateLimitPolicy,
};
use mockito::Matcher;
use secrecy::SecretString;

/// 항상 실패하는 주 제공자
struct DownProvider;

#[async_trait]
impl MarketDataProvider for DownProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_quotes(&self, _symbols: &[String]) -> ProviderResult<Quote> {
        Err(DataError::FetchError("connection reset".into()))
    }

    async fn fetch_fundamentals(&self, _symbols: &[String]) -> ProviderResult<FundamentalsRecord> {
        Err(DataError::FetchError("connection reset".into()))
    }
}

fn build_service(base_url: String) -> FeedService {
    let cache = Arc::new(MetricsCache::new(Arc::new(MemoryCache::new())));
    let alpha = AlphaVantageProvider::new(
        base_url,
        SecretString::new("integration-key".into()),
        Duration::from_secs(5),
    )
    .unwrap();

    FeedService::builder(cache)
        .primary(ProviderSlot::new(
            Arc::new(DownProvider),
            RateLimitPolicy::per_minute(100),
            Duration::from_secs(10),
        ))
        .secondary(Some(ProviderSlot::new(
            Arc::new(alpha),
            RateLimitPolicy::per_minute(5),
            Duration::from_secs(10),
        )))
        .build()
}

#[tokio::test]
async fn test_secondary_serves_fundamentals_when_primary_down() {
    let mut server = mockito::Server::new_async().await;
    let overview = server
        .mock("GET", "/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("function".into(), "OVERVIEW".into()),
            Matcher::UrlEncoded("symbol".into(), "IBM".into()),
        ]))
        .with_body(r#"{"Symbol": "IBM", "PERatio": "22.1", "ProfitMargin": "0.12"}"#)
        .expect(1)
        .create_async()
        .await;

    let svc = build_service(server.url());
    let symbols = vec!["IBM".to_string()];

    let batch = svc
        .fetch_batch::<FundamentalsRecord>(&symbols)
        .await
        .unwrap();
    assert_eq!(batch.source("IBM"), Some(DataSource::Provider("alpha_vantage")));
    assert_eq!(batch.get("IBM").unwrap().pe_ratio, Some(22.1));

    // 두 번째 요청은 캐시에서 제공되어 업스트림을 다시 호출하지 않음
    let batch = svc
        .fetch_batch::<FundamentalsRecord>(&symbols)
        .await
        .unwrap();
    assert_eq!(batch.source("IBM"), Some(DataSource::Cache));
    overview.assert_async().await;
}

#[tokio::test]
async fn test_secondary_rate_limit_with_primary_down_is_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _note = server
        .mock("GET", "/query")
        .match_query(Matcher::Any)
        .with_body(r#"{"Information": "API rate limit reached"}"#)
        .create_async()
        .await;

    let svc = build_service(server.url());
    let err = svc
        .fetch_batch::<Quote>(&["MSFT".to_string()])
        .await
        .unwrap_err();

    // 주 제공자는 일반 장애, 보조 제공자는 한도 초과 → 서비스 불가
    assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    let providers = err.details()["providers"].as_array().unwrap().clone();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[1]["provider"], "alpha_vantage");
}

#[tokio::test]
async fn test_limiter_stats_cover_both_providers() {
    let server = mockito::Server::new_async().await;
    let svc = build_service(server.url());

    let stats = svc.limiter_stats().await;
    let providers: HashMap<_, _> = stats
        .iter()
        .map(|s| (s.provider.as_str(), s.windows[0].limit))
        .collect();
    assert_eq!(providers["yahoo"], 100);
    assert_eq!(providers["alpha_vantage"], 5);
}

#[tokio::test]
async fn test_secondary_http_requests_stay_within_minute_limit() {
    let mut server = mockito::Server::new_async().await;
    let quotes = server
        .mock("GET", "/query")
        .match_query(Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()))
        .with_body(r#"{"Global Quote": {"05. price": "100.00", "08. previous close": "99.00"}}"#)
        .expect(5)
        .create_async()
        .await;

    let svc = build_service(server.url());
    let symbols: Vec<String> = [
        "AAPL", "MSFT", "GOOG", "AMZN", "META", "NVDA", "TSLA", "NFLX", "ORCL",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let batch = svc.fetch_batch::<Quote>(&symbols).await.unwrap();

    // 분당 5회 한도이므로 HTTP 요청도 5회까지만
    quotes.assert_async().await;
    assert_eq!(batch.records.len(), 5);
    assert_eq!(batch.failed_symbols.len(), 4);

    let stats = svc.limiter_stats().await;
    let alpha = stats.iter().find(|s| s.provider == "alpha_vantage").unwrap();
    assert_eq!(alpha.windows[0].used, 5);
}
