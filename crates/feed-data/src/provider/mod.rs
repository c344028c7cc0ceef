//! 업스트림 시장 데이터 제공자.
//!
//! - [`YahooProvider`]: 주 제공자 (`yahoo_finance_api`)
//! - [`AlphaVantageProvider`]: 선택적 보조 제공자 (REST)
//!
//! 제공자는 심볼 배치를 한 번의 호출로 처리하며, 일부 심볼 실패는
//! 결과 맵에서 빠지는 것으로 표현합니다. 배치 전체가 실패한 경우에만
//! `Err`를 반환합니다.

pub mod alpha_vantage;
pub mod yahoo;

use std::collections::HashMap;

use async_trait::async_trait;
use feed_core::{DataKind, FundamentalsRecord, Quote};
use serde::{de::DeserializeOwned, Serialize};

use tracing::{info, warn};

use crate::error::{DataError, Result};

pub use alpha_vantage::AlphaVantageProvider;
pub use yahoo::YahooProvider;

/// 심볼별 배치 결과.
pub type ProviderResult<T> = Result<HashMap<String, T>>;

/// 시장 데이터 제공자 트레잇.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름 (캐시 키, 에러 코드, 메트릭 라벨에 사용).
    fn name(&self) -> &'static str;

    /// 시세 배치 조회.
    async fn fetch_quotes(&self, symbols: &[String]) -> ProviderResult<Quote>;

    /// 펀더멘털 배치 조회.
    async fn fetch_fundamentals(&self, symbols: &[String]) -> ProviderResult<FundamentalsRecord>;

    /// 심볼 `symbols`개 배치에 드는 업스트림 요청 수.
    ///
    /// 요청 한도는 이 값만큼 차감됩니다. 기본값은 배치당 1회입니다.
    fn request_cost(&self, _symbols: usize) -> u32 {
        1
    }
}

/// 캐시되고 제공자에서 조회되는 레코드.
#[async_trait]
pub trait FeedRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// 캐시 네임스페이스 및 TTL을 결정하는 데이터 종류.
    const KIND: DataKind;

    /// 제공자에서 이 레코드 종류를 조회합니다.
    async fn fetch_from(
        provider: &dyn MarketDataProvider,
        symbols: &[String],
    ) -> ProviderResult<Self>;
}

#[async_trait]
impl FeedRecord for Quote {
    const KIND: DataKind = DataKind::Context;

    async fn fetch_from(
        provider: &dyn MarketDataProvider,
        symbols: &[String],
    ) -> ProviderResult<Self> {
        provider.fetch_quotes(symbols).await
    }
}

#[async_trait]
impl FeedRecord for FundamentalsRecord {
    const KIND: DataKind = DataKind::Fundamentals;

    async fn fetch_from(
        provider: &dyn MarketDataProvider,
        symbols: &[String],
    ) -> ProviderResult<Self> {
        provider.fetch_fundamentals(symbols).await
    }
}

/// 심볼별 결과를 배치 결과로 합칩니다.
///
/// 하나라도 성공하면 성공한 심볼만 담아 반환하고, 모두 실패하면
/// 마지막 에러를 반환합니다. 요청 한도 초과가 섞여 있으면 그것을 우선합니다.
pub(crate) fn collect_batch<T>(
    symbols: &[String],
    results: Vec<Result<T>>,
) -> ProviderResult<T> {
    let mut data = HashMap::with_capacity(symbols.len());
    let mut last_error = None;

    for (symbol, result) in symbols.iter().zip(results) {
        match result {
            Ok(record) => {
                data.insert(symbol.clone(), record);
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "심볼 조회 실패");
                let keep_previous = matches!(last_error, Some(DataError::RateLimited(_)));
                if !keep_previous {
                    last_error = Some(e);
                }
            }
        }
    }

    if data.is_empty() {
        if let Some(err) = last_error {
            return Err(err);
        }
    }

    info!(
        requested = symbols.len(),
        fetched = data.len(),
        "배치 조회 완료"
    );
    Ok(data)
}
