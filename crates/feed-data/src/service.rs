//! cache-aside 조회와 폴백 체인.
//!
//! 요청 하나는 다음 순서로 처리됩니다:
//!
//! 1. 심볼별 신선한 캐시 항목 조회 (제공자 순서대로)
//! 2. 캐시에 없는 심볼을 주 제공자에 한 번의 배치 호출로 요청
//!    (업스트림 요청 수만큼 요청 한도 차감, 타임아웃 적용. 남은 한도가
//!    부족하면 한도 안에 들어가는 만큼만 요청)
//! 3. 여전히 없는 심볼을 보조 제공자에 요청
//! 4. 그래도 없는 심볼은 마지막 정상 사본(stale)으로 채움
//!    (보조 제공자 전용 조회에서는 생략)
//! 5. 아무것도 제공할 수 없으면 재시도 힌트와 함께 에러
//!
//! 캐시 장애는 경고 로그만 남기고 미스로 취급합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use feed_core::{normalize_symbols, CacheTtls, FeedError, FeedResult, GlobalContext, Quote};
use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::provider::{FeedRecord, MarketDataProvider};
use crate::rate_limiter::{FixedWindowLimiter, RateLimitPolicy, RateLimiterStats};
use crate::storage::{fresh_key, stale_key, CacheStats, MetricsCache};

/// 요청 한도와 타임아웃이 붙은 제공자.
pub struct ProviderSlot {
    provider: Arc<dyn MarketDataProvider>,
    limiter: FixedWindowLimiter,
    timeout: Duration,
}

impl ProviderSlot {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        policy: RateLimitPolicy,
        timeout: Duration,
    ) -> Self {
        let limiter = FixedWindowLimiter::new(provider.name(), policy);
        Self {
            provider,
            limiter,
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    /// `available`개 허가 안에서 호출할 수 있는 최대 심볼 수.
    ///
    /// 한 개도 들어가지 않으면 `requested`를 그대로 반환합니다.
    fn fitting_len(&self, requested: usize, available: u32) -> usize {
        (1..=requested)
            .rev()
            .find(|&n| self.provider.request_cost(n) <= available)
            .unwrap_or(requested)
    }
}

/// 심볼 데이터의 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// 신선한 캐시 항목
    Cache,
    /// 이번 요청에서 제공자로부터 조회
    Provider(&'static str),
    /// 마지막 정상 사본
    Stale,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Cache => f.write_str("cache"),
            DataSource::Provider(name) => f.write_str(name),
            DataSource::Stale => f.write_str("stale"),
        }
    }
}

/// 배치 조회 결과.
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    /// 정규화된 요청 심볼 (요청 순서)
    pub symbols: Vec<String>,
    pub records: HashMap<String, T>,
    pub sources: HashMap<String, DataSource>,
    /// 어떤 단계에서도 얻지 못한 심볼
    pub failed_symbols: Vec<String>,
}

impl<T> BatchResult<T> {
    fn new(symbols: Vec<String>) -> Self {
        Self {
            records: HashMap::with_capacity(symbols.len()),
            sources: HashMap::with_capacity(symbols.len()),
            symbols,
            failed_symbols: Vec::new(),
        }
    }

    fn insert(&mut self, symbol: &str, record: T, source: DataSource) {
        self.records.insert(symbol.to_string(), record);
        self.sources.insert(symbol.to_string(), source);
    }

    fn missing(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|s| !self.records.contains_key(*s))
            .cloned()
            .collect()
    }

    pub fn get(&self, symbol: &str) -> Option<&T> {
        self.records.get(symbol)
    }

    pub fn source(&self, symbol: &str) -> Option<DataSource> {
        self.sources.get(symbol).copied()
    }

    /// stale 사본이 하나라도 포함되었는지 여부.
    pub fn is_stale(&self) -> bool {
        self.sources.values().any(|s| *s == DataSource::Stale)
    }

    /// 요청 순서대로 (심볼, 레코드) 쌍을 순회합니다.
    pub fn ordered(&self) -> impl Iterator<Item = (&str, Option<&T>)> {
        self.symbols
            .iter()
            .map(|s| (s.as_str(), self.records.get(s)))
    }

    /// 일부 심볼이 누락되었으면 해당 에러를 반환합니다.
    pub fn partial_error(&self) -> Option<FeedError> {
        (!self.failed_symbols.is_empty()).then(|| FeedError::PartialData {
            missing: self.failed_symbols.clone(),
        })
    }
}

/// 제공자 단계 실패 기록.
#[derive(Debug)]
struct StepFailure {
    provider: &'static str,
    reason: String,
    /// 요청 한도 초과인 경우 재시도 대기 시간
    retry_after_secs: Option<u64>,
}

/// 시장 데이터 프록시 서비스.
pub struct FeedService {
    cache: Arc<MetricsCache>,
    primary: Option<ProviderSlot>,
    secondary: Option<ProviderSlot>,
    ttls: CacheTtls,
    retry_after_secs: u64,
}

/// [`FeedService`] 빌더.
pub struct FeedServiceBuilder {
    cache: Arc<MetricsCache>,
    primary: Option<ProviderSlot>,
    secondary: Option<ProviderSlot>,
    ttls: CacheTtls,
    retry_after_secs: u64,
}

impl FeedServiceBuilder {
    pub fn primary(mut self, slot: ProviderSlot) -> Self {
        self.primary = Some(slot);
        self
    }

    pub fn secondary(mut self, slot: Option<ProviderSlot>) -> Self {
        self.secondary = slot;
        self
    }

    pub fn ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// 모든 단계 실패 시 권고할 재시도 대기 시간.
    pub fn retry_after_secs(mut self, secs: u64) -> Self {
        self.retry_after_secs = secs;
        self
    }

    pub fn build(self) -> FeedService {
        FeedService {
            cache: self.cache,
            primary: self.primary,
            secondary: self.secondary,
            ttls: self.ttls,
            retry_after_secs: self.retry_after_secs,
        }
    }
}

impl FeedService {
    pub fn builder(cache: Arc<MetricsCache>) -> FeedServiceBuilder {
        FeedServiceBuilder {
            cache,
            primary: None,
            secondary: None,
            ttls: CacheTtls::default(),
            retry_after_secs: 60,
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_secs
    }

    /// 제공자별 요청 한도 통계.
    pub async fn limiter_stats(&self) -> Vec<RateLimiterStats> {
        let mut stats = Vec::new();
        for slot in self.primary.iter().chain(self.secondary.iter()) {
            stats.push(slot.limiter.stats().await);
        }
        stats
    }

    /// 전체 폴백 체인으로 배치를 조회합니다.
    pub async fn fetch_batch<T: FeedRecord>(&self, symbols: &[String]) -> FeedResult<BatchResult<T>> {
        let slots: Vec<&ProviderSlot> = self.primary.iter().chain(self.secondary.iter()).collect();
        self.fetch_with(&slots, symbols, true).await
    }

    /// 보조 제공자만으로 배치를 조회합니다.
    ///
    /// stale 사본은 제공자 구분 없이 저장되므로 이 경로에서는 사용하지 않습니다.
    pub async fn fetch_batch_secondary<T: FeedRecord>(
        &self,
        symbols: &[String],
    ) -> FeedResult<BatchResult<T>> {
        let Some(secondary) = self.secondary.as_ref() else {
            return Err(FeedError::NotConfigured {
                code: "SECONDARY_PROVIDER_NOT_CONFIGURED".to_string(),
                message: "Secondary provider is not configured".to_string(),
            });
        };
        self.fetch_with(&[secondary], symbols, false).await
    }

    /// 전체 폴백 체인으로 글로벌 컨텍스트를 조립합니다.
    pub async fn global_context(&self, symbols: &[String]) -> FeedResult<GlobalContext> {
        let batch = self.fetch_batch::<Quote>(symbols).await?;
        self.assemble_context(&batch)
    }

    /// 보조 제공자만으로 글로벌 컨텍스트를 조립합니다.
    pub async fn secondary_global_context(&self, symbols: &[String]) -> FeedResult<GlobalContext> {
        let batch = self.fetch_batch_secondary::<Quote>(symbols).await?;
        self.assemble_context(&batch)
    }

    fn assemble_context(&self, batch: &BatchResult<Quote>) -> FeedResult<GlobalContext> {
        let assembly = GlobalContext::assemble(batch.ordered(), batch.is_stale());
        if !assembly.missing_keys.is_empty() {
            warn!(
                missing = ?assembly.missing_key_names(),
                failed = ?assembly.failed_symbols,
                "글로벌 컨텍스트 일부 누락"
            );
        }
        let mut context = assembly.require_critical(self.retry_after_secs)?;
        for (symbol, source) in &batch.sources {
            context.record_source(symbol, source.to_string());
        }
        if !context.proxies.is_empty() {
            info!(proxies = ?context.proxies, "대체 심볼 시세 포함");
        }
        Ok(context)
    }

    #[instrument(skip(self, slots, symbols), fields(kind = %T::KIND, count = symbols.len()))]
    async fn fetch_with<T: FeedRecord>(
        &self,
        slots: &[&ProviderSlot],
        symbols: &[String],
        serve_stale: bool,
    ) -> FeedResult<BatchResult<T>> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(FeedError::InvalidInput(
                "at least one symbol is required".to_string(),
            ));
        }

        let mut batch = BatchResult::new(symbols);

        // 1. 신선한 캐시
        for symbol in batch.symbols.clone() {
            for slot in slots {
                let key = fresh_key(T::KIND, slot.name(), &symbol);
                if let Some(record) = self.cache_get::<T>(&key).await {
                    batch.insert(&symbol, record, DataSource::Cache);
                    break;
                }
            }
        }

        // 2~3. 제공자 체인
        let mut failures = Vec::new();
        for slot in slots {
            let missing = batch.missing();
            if missing.is_empty() {
                break;
            }
            match self.call_provider::<T>(slot, &missing).await {
                Ok(fetched) => {
                    for (symbol, record) in fetched {
                        if !missing.contains(&symbol) {
                            continue;
                        }
                        self.store(slot.name(), &symbol, &record).await;
                        batch.insert(&symbol, record, DataSource::Provider(slot.name()));
                    }
                }
                Err(failure) => failures.push(failure),
            }
        }

        // 4. 마지막 정상 사본
        if serve_stale {
            for symbol in &batch.missing() {
                if let Some(record) = self.cache_get::<T>(&stale_key(T::KIND, symbol)).await {
                    counter!("feed_stale_served_total", "kind" => T::KIND.as_str()).increment(1);
                    batch.insert(symbol, record, DataSource::Stale);
                }
            }
        }
        batch.failed_symbols = batch.missing();

        // 5. 아무것도 제공할 수 없음
        if batch.records.is_empty() {
            return Err(self.total_failure(&batch.failed_symbols, failures));
        }

        if let Some(partial) = batch.partial_error() {
            warn!(error = %partial, "일부 심볼 데이터 없음");
        }
        info!(
            requested = batch.symbols.len(),
            served = batch.records.len(),
            stale = batch.is_stale(),
            "배치 조회 완료"
        );
        Ok(batch)
    }

    /// 업스트림 요청 수만큼 요청 한도를 차감하고 제공자를 한 번 호출합니다.
    ///
    /// 남은 한도가 배치 전체에 부족하면 앞쪽 심볼만 요청하고, 나머지는
    /// 누락으로 남겨 다음 단계로 넘깁니다.
    async fn call_provider<T: FeedRecord>(
        &self,
        slot: &ProviderSlot,
        symbols: &[String],
    ) -> Result<HashMap<String, T>, StepFailure> {
        let provider = slot.name();

        let available = slot.limiter.available().await;
        let len = slot.fitting_len(symbols.len(), available);
        if len < symbols.len() {
            info!(
                provider,
                requested = symbols.len(),
                fetching = len,
                available,
                "남은 요청 한도에 맞춰 배치 축소"
            );
        }
        let symbols = &symbols[..len];

        let decision = slot
            .limiter
            .try_acquire_n(slot.provider.request_cost(len))
            .await;
        if let Some(retry_after_secs) = decision.retry_after_secs() {
            counter!("feed_upstream_requests_total", "provider" => provider, "outcome" => "rate_limited")
                .increment(1);
            return Err(StepFailure {
                provider,
                reason: "rate limit exhausted".to_string(),
                retry_after_secs: Some(retry_after_secs),
            });
        }

        debug!(provider, count = symbols.len(), "업스트림 배치 호출");
        let started = Instant::now();
        let result =
            tokio::time::timeout(slot.timeout, T::fetch_from(slot.provider.as_ref(), symbols)).await;
        histogram!("feed_upstream_duration_seconds", "provider" => provider)
            .record(started.elapsed().as_secs_f64());

        let (outcome, failure) = match result {
            Ok(Ok(data)) => {
                counter!("feed_upstream_requests_total", "provider" => provider, "outcome" => "success")
                    .increment(1);
                return Ok(data);
            }
            Ok(Err(e)) if e.is_rate_limited() => (
                "rate_limited",
                StepFailure {
                    provider,
                    reason: e.to_string(),
                    retry_after_secs: Some(self.retry_after_secs),
                },
            ),
            Ok(Err(e)) => (
                "error",
                StepFailure {
                    provider,
                    reason: e.to_string(),
                    retry_after_secs: None,
                },
            ),
            Err(_) => (
                "timeout",
                StepFailure {
                    provider,
                    reason: format!("timed out after {}s", slot.timeout.as_secs()),
                    retry_after_secs: None,
                },
            ),
        };

        counter!("feed_upstream_requests_total", "provider" => provider, "outcome" => outcome)
            .increment(1);
        warn!(provider, reason = %failure.reason, "제공자 호출 실패, 다음 단계로 진행");
        Err(failure)
    }

    fn total_failure(&self, failed_symbols: &[String], failures: Vec<StepFailure>) -> FeedError {
        let all_rate_limited =
            !failures.is_empty() && failures.iter().all(|f| f.retry_after_secs.is_some());

        if all_rate_limited {
            // 가장 먼저 풀리는 제공자 기준
            let soonest = failures
                .iter()
                .filter_map(|f| f.retry_after_secs.map(|secs| (f.provider, secs)))
                .min_by_key(|(_, secs)| *secs);
            if let Some((provider, retry_after_secs)) = soonest {
                return FeedError::RateLimited {
                    provider: provider.to_string(),
                    retry_after_secs,
                };
            }
        }

        let providers: Vec<_> = failures
            .iter()
            .map(|f| serde_json::json!({ "provider": f.provider, "error": f.reason }))
            .collect();

        FeedError::ServiceUnavailable {
            message: "No provider or cached data available".to_string(),
            retry_after_secs: self.retry_after_secs,
            details: serde_json::json!({
                "failed_symbols": failed_symbols,
                "providers": providers,
            }),
        }
    }

    async fn cache_get<T: FeedRecord>(&self, key: &str) -> Option<T> {
        match self.cache.get::<T>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "캐시 조회 실패, 미스로 처리");
                None
            }
        }
    }

    /// 신선한 항목과 마지막 정상 사본을 함께 저장합니다.
    async fn store<T: FeedRecord>(&self, provider: &str, symbol: &str, record: &T) {
        let fresh = fresh_key(T::KIND, provider, symbol);
        if let Err(e) = self.cache.set(&fresh, record, self.ttls.for_kind(T::KIND)).await {
            warn!(key = %fresh, error = %e, "캐시 저장 실패");
            return;
        }
        let stale = stale_key(T::KIND, symbol);
        if let Err(e) = self.cache.set(&stale, record, self.ttls.stale_secs).await {
            warn!(key = %stale, error = %e, "stale 사본 저장 실패");
        }
    }
}
