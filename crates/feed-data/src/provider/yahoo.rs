//! Yahoo Finance 제공자.
//!
//! 시세는 최근 5일 일봉의 마지막 두 종가로 현재가와 변동률을 계산하고,
//! 펀더멘털은 `get_ticker_info`(quote summary)에서 추출합니다.
//!
//! 펀더멘털 심볼에 `.NS`/`.BO` 접미사가 없으면 설정된 접미사(기본 `.NS`)를 붙여
//! 조회하고, 결과는 요청한 심볼 기준으로 돌려줍니다.

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_core::{FundamentalsRecord, Quote};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

use super::{collect_batch, MarketDataProvider, ProviderResult};
use crate::error::{DataError, Result};

/// Yahoo Finance 기반 제공자.
pub struct YahooProvider {
    /// 시세 조회용 커넥터 (`&self`로 동시 호출 가능)
    quotes: yahoo::YahooConnector,
    /// ticker info 조회용 커넥터 (`get_ticker_info`가 `&mut self`를 요구)
    info: Mutex<yahoo::YahooConnector>,
    /// 펀더멘털 심볼 접미사 (빈 문자열이면 변환 안 함)
    fundamentals_suffix: String,
}

impl YahooProvider {
    pub const NAME: &'static str = "yahoo";

    /// 새로운 YahooProvider 생성.
    pub fn new() -> Result<Self> {
        let quotes = yahoo::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        let info = yahoo::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;

        Ok(Self {
            quotes,
            info: Mutex::new(info),
            fundamentals_suffix: String::new(),
        })
    }

    /// 펀더멘털 조회 시 붙일 거래소 접미사를 설정합니다.
    #[must_use]
    pub fn with_fundamentals_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.fundamentals_suffix = suffix.into();
        self
    }

    /// 심볼의 현재가와 전일 종가 조회.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        // 주말/휴일을 고려하여 5일 범위 조회
        let response = self
            .quotes
            .get_quote_range(symbol, "1d", "5d")
            .await
            .map_err(|e| classify(symbol, e))?;

        let bars = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("{}: {}", symbol, e)))?;

        let Some(current) = bars.last() else {
            return Err(DataError::NotFound(format!("심볼 {} 데이터 없음", symbol)));
        };
        let as_of = DateTime::from_timestamp(current.timestamp as i64, 0).unwrap_or_else(Utc::now);

        debug!(symbol, bars = bars.len(), close = current.close, "Yahoo 시세 수신");

        let quote = match bars.len().checked_sub(2).and_then(|i| bars.get(i)) {
            Some(previous) => Quote::from_closes(symbol, current.close, previous.close, as_of),
            None => Quote::new(symbol, current.close, as_of),
        };
        Ok(quote)
    }

    /// quote summary에서 펀더멘털 지표를 추출합니다.
    async fn fetch_ticker_info(
        connector: &mut yahoo::YahooConnector,
        symbol: &str,
    ) -> Result<FundamentalsRecord> {
        let summary = connector
            .get_ticker_info(symbol)
            .await
            .map_err(|e| classify(symbol, e))?;

        let quote_summary = summary.quote_summary.ok_or_else(|| {
            DataError::NotFound(format!("Yahoo ticker info 결과 없음: {}", symbol))
        })?;

        let result_data = quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| {
                DataError::NotFound(format!("Yahoo ticker info 결과 비어있음: {}", symbol))
            })?;

        let summary_detail = result_data.summary_detail.as_ref();
        let key_stats = result_data.default_key_statistics.as_ref();
        let financial_data = result_data.financial_data.as_ref();

        let record = FundamentalsRecord {
            market_cap: summary_detail
                .and_then(|sd| sd.market_cap)
                .map(|v| v as f64),
            pe_ratio: summary_detail.and_then(|sd| sd.trailing_pe),
            pb_ratio: key_stats.and_then(|ks| ks.price_to_book),
            // 비율 지표는 % 단위로 변환
            roe: financial_data
                .and_then(|fd| fd.return_on_equity)
                .map(to_percent),
            debt_to_equity: financial_data.and_then(|fd| fd.debt_to_equity),
            profit_margin: financial_data
                .and_then(|fd| fd.profit_margins)
                .map(to_percent),
            operating_margin: financial_data
                .and_then(|fd| fd.operating_margins)
                .map(to_percent),
            ..FundamentalsRecord::empty(symbol)
        };

        if record.is_empty() {
            return Err(DataError::NotFound(format!("펀더멘털 지표 없음: {}", symbol)));
        }
        Ok(record)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    async fn fetch_quotes(&self, symbols: &[String]) -> ProviderResult<Quote> {
        let results = join_all(symbols.iter().map(|s| self.fetch_quote(s))).await;
        collect_batch(symbols, results)
    }

    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    async fn fetch_fundamentals(&self, symbols: &[String]) -> ProviderResult<FundamentalsRecord> {
        let mut connector = self.info.lock().await;
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let upstream = exchange_symbol(symbol, &self.fundamentals_suffix);
            let result = Self::fetch_ticker_info(&mut connector, &upstream)
                .await
                .map(|record| FundamentalsRecord {
                    symbol: symbol.clone(),
                    ..record
                });
            results.push(result);
        }
        collect_batch(symbols, results)
    }

    // 심볼마다 업스트림 요청 1회
    fn request_cost(&self, symbols: usize) -> u32 {
        u32::try_from(symbols).unwrap_or(u32::MAX)
    }
}

/// 거래소 접미사가 없는 심볼에 `suffix`를 붙입니다.
///
/// `RELIANCE` → `RELIANCE.NS`, `TCS.BO`는 그대로.
fn exchange_symbol<'a>(symbol: &'a str, suffix: &str) -> Cow<'a, str> {
    if suffix.is_empty() || symbol.ends_with(".NS") || symbol.ends_with(".BO") {
        Cow::Borrowed(symbol)
    } else {
        Cow::Owned(format!("{}{}", symbol, suffix))
    }
}

fn to_percent(ratio: f64) -> f64 {
    ratio * 100.0
}

/// Yahoo 에러를 분류합니다. HTTP 429는 요청 한도 초과로 취급합니다.
fn classify(symbol: &str, err: yahoo::YahooError) -> DataError {
    let message = err.to_string();
    if message.contains("429") || message.contains("Too Many Requests") {
        DataError::RateLimited(format!("{}: {}", symbol, message))
    } else {
        DataError::FetchError(format!("{}: {}", symbol, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exchange_symbol_appends_suffix() {
        assert_eq!(exchange_symbol("RELIANCE", ".NS"), "RELIANCE.NS");
        assert_eq!(exchange_symbol("SBIN.NS", ".NS"), "SBIN.NS");
        assert_eq!(exchange_symbol("TCS.BO", ".NS"), "TCS.BO");
        assert_eq!(exchange_symbol("INFY", ".BO"), "INFY.BO");
        // 접미사 미설정 시 변환 안 함
        assert_eq!(exchange_symbol("AAPL", ""), "AAPL");
    }

    #[test]
    fn test_request_cost_is_per_symbol() {
        let provider = YahooProvider::new().unwrap();
        assert_eq!(provider.request_cost(9), 9);
        assert_eq!(provider.request_cost(1), 1);
    }

    #[test]
    fn test_to_percent() {
        assert!((to_percent(0.125) - 12.5).abs() < 1e-9);
    }

    /// 실제 네트워크 호출이 필요하므로 기본 실행에서 제외
    #[tokio::test]
    #[ignore]
    async fn test_fetch_index_quotes_live() {
        let provider = YahooProvider::new().unwrap();
        let data = provider
            .fetch_quotes(&symbols(&["^GSPC", "^VIX"]))
            .await
            .unwrap();
        assert!(data.contains_key("^GSPC"));
    }
}
