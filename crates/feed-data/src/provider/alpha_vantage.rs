//! Alpha Vantage 제공자.
//!
//! - 시세: `GLOBAL_QUOTE` (외환 심볼 `XXXYYY=X`는 `CURRENCY_EXCHANGE_RATE`)
//! - 펀더멘털: `OVERVIEW`
//!
//! 응답 본문에 `Note` 또는 `Information` 필드가 있으면 무료 플랜 한도 초과로
//! 간주합니다. 숫자 필드는 문자열로 오며 `"None"`, `"-"`는 값 없음으로 처리합니다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use feed_core::{AlphaVantageConfig, FundamentalsRecord, Quote};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{collect_batch, MarketDataProvider, ProviderResult};
use crate::error::{DataError, Result};

/// Alpha Vantage REST 클라이언트.
pub struct AlphaVantageProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    /// 요청 심볼 → Alpha Vantage 심볼
    aliases: HashMap<String, String>,
}

impl AlphaVantageProvider {
    pub const NAME: &'static str = "alpha_vantage";

    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            aliases: HashMap::new(),
        })
    }

    /// 설정에서 생성합니다. 비활성 또는 API 키가 없으면 `None`.
    pub fn from_config(config: &AlphaVantageConfig) -> Result<Option<Self>> {
        let Some(key) = config.api_key.as_ref().filter(|_| config.enabled) else {
            return Ok(None);
        };
        let provider = Self::new(
            config.base_url.clone(),
            SecretString::new(key.expose_secret().into()),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_aliases(config.symbol_aliases.clone());
        Ok(Some(provider))
    }

    /// 심볼 별칭을 설정합니다.
    #[must_use]
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    fn upstream_symbol<'a>(&'a self, symbol: &'a str) -> &'a str {
        // 설정 파일 키는 소문자로 정규화될 수 있음
        self.aliases
            .get(symbol)
            .or_else(|| self.aliases.get(&symbol.to_lowercase()))
            .map(String::as_str)
            .unwrap_or(symbol)
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", self.api_key.expose_secret())])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;

        for field in ["Note", "Information"] {
            if let Some(note) = body.get(field).and_then(Value::as_str) {
                return Err(DataError::RateLimited(note.to_string()));
            }
        }
        if let Some(message) = body.get("Error Message").and_then(Value::as_str) {
            return Err(DataError::NotFound(message.to_string()));
        }
        Ok(body)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let upstream = self.upstream_symbol(symbol);
        if let Some((from, to)) = forex_pair(upstream) {
            return self.fetch_exchange_rate(symbol, from, to).await;
        }

        let body = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", upstream)])
            .await?;
        let quote = body
            .get("Global Quote")
            .filter(|q| q.as_object().is_some_and(|o| !o.is_empty()))
            .ok_or_else(|| DataError::NotFound(format!("GLOBAL_QUOTE 결과 없음: {}", symbol)))?;

        let price = number(quote, "05. price")
            .ok_or_else(|| DataError::ParseError(format!("가격 없음: {}", symbol)))?;

        let mut result = match number(quote, "08. previous close") {
            Some(previous) => Quote::from_closes(symbol, price, previous, Utc::now()),
            None => Quote::new(symbol, price, Utc::now()),
        };
        // 제공자가 준 변동률이 있으면 우선 사용
        if let Some(pct) = percent(quote, "10. change percent") {
            result = result.with_change_percent(pct);
        }
        if upstream != symbol {
            result = result.with_proxy_symbol(upstream);
        }
        debug!(symbol, price, "Alpha Vantage 시세 수신");
        Ok(result)
    }

    async fn fetch_exchange_rate(&self, symbol: &str, from: &str, to: &str) -> Result<Quote> {
        let body = self
            .query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", from),
                ("to_currency", to),
            ])
            .await?;
        let rate = body
            .get("Realtime Currency Exchange Rate")
            .and_then(|r| number(r, "5. Exchange Rate"))
            .ok_or_else(|| DataError::NotFound(format!("환율 결과 없음: {}", symbol)))?;

        Ok(Quote::new(symbol, rate, Utc::now()))
    }

    async fn fetch_overview(&self, symbol: &str) -> Result<FundamentalsRecord> {
        let upstream = self.upstream_symbol(symbol);
        let body = self
            .query(&[("function", "OVERVIEW"), ("symbol", upstream)])
            .await?;

        let record = FundamentalsRecord {
            market_cap: number(&body, "MarketCapitalization"),
            pe_ratio: number(&body, "PERatio"),
            pb_ratio: number(&body, "PriceToBookRatio"),
            roe: number(&body, "ReturnOnEquityTTM").map(|v| v * 100.0),
            debt_to_equity: None,
            profit_margin: number(&body, "ProfitMargin").map(|v| v * 100.0),
            operating_margin: number(&body, "OperatingMarginTTM").map(|v| v * 100.0),
            ..FundamentalsRecord::empty(symbol)
        };

        if record.is_empty() {
            return Err(DataError::NotFound(format!("OVERVIEW 결과 없음: {}", symbol)));
        }
        Ok(record)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    // 무료 플랜 한도가 작으므로 심볼을 순차 조회하고 한도 초과 시 중단
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    async fn fetch_quotes(&self, symbols: &[String]) -> ProviderResult<Quote> {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let result = self.fetch_quote(symbol).await;
            let stop = matches!(result, Err(DataError::RateLimited(_)));
            results.push(result);
            if stop {
                break;
            }
        }
        collect_batch(&symbols[..results.len()], results)
    }

    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    async fn fetch_fundamentals(&self, symbols: &[String]) -> ProviderResult<FundamentalsRecord> {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let result = self.fetch_overview(symbol).await;
            let stop = matches!(result, Err(DataError::RateLimited(_)));
            results.push(result);
            if stop {
                break;
            }
        }
        collect_batch(&symbols[..results.len()], results)
    }

    // 심볼마다 `query` 1회
    fn request_cost(&self, symbols: usize) -> u32 {
        u32::try_from(symbols).unwrap_or(u32::MAX)
    }
}

/// `USDINR=X` → `("USD", "INR")`
fn forex_pair(symbol: &str) -> Option<(&str, &str)> {
    let pair = symbol.strip_suffix("=X")?;
    if pair.len() == 6 && pair.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((&pair[..3], &pair[3..]))
    } else {
        None
    }
}

/// 문자열 숫자 필드를 파싱합니다.
fn number(value: &Value, field: &str) -> Option<f64> {
    match value.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// `"0.4500%"` 형식의 퍼센트 필드를 파싱합니다.
fn percent(value: &Value, field: &str) -> Option<f64> {
    value
        .get(field)?
        .as_str()?
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(server: &mockito::ServerGuard) -> AlphaVantageProvider {
        AlphaVantageProvider::new(
            server.url(),
            SecretString::new("test-key".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_forex_pair() {
        assert_eq!(forex_pair("USDINR=X"), Some(("USD", "INR")));
        assert_eq!(forex_pair("GC=F"), None);
        assert_eq!(forex_pair("^GSPC"), None);
    }

    #[test]
    fn test_number_parsing() {
        let v = serde_json::json!({"a": "12.5", "b": "None", "c": "-", "d": 3});
        assert_eq!(number(&v, "a"), Some(12.5));
        assert_eq!(number(&v, "b"), None);
        assert_eq!(number(&v, "c"), None);
        assert_eq!(number(&v, "d"), Some(3.0));
    }

    #[tokio::test]
    async fn test_global_quote() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()),
                Matcher::UrlEncoded("symbol".into(), "IBM".into()),
                Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Global Quote": {"01. symbol": "IBM", "05. price": "210.00",
                    "08. previous close": "200.00", "10. change percent": "5.0000%"}}"#,
            )
            .create_async()
            .await;

        let data = provider(&server)
            .fetch_quotes(&symbols(&["IBM"]))
            .await
            .unwrap();
        mock.assert_async().await;

        let quote = &data["IBM"];
        assert_eq!(quote.price, 210.0);
        assert!(quote.proxy_symbol.is_none());
        assert_eq!(quote.previous_close, Some(200.0));
        assert_eq!(quote.change_percent, Some(5.0));
    }

    #[tokio::test]
    async fn test_alias_and_exchange_rate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "CURRENCY_EXCHANGE_RATE".into()),
                Matcher::UrlEncoded("from_currency".into(), "USD".into()),
                Matcher::UrlEncoded("to_currency".into(), "INR".into()),
            ]))
            .with_body(r#"{"Realtime Currency Exchange Rate": {"5. Exchange Rate": "83.2500"}}"#)
            .create_async()
            .await;

        let data = provider(&server)
            .fetch_quotes(&symbols(&["USDINR=X"]))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(data["USDINR=X"].price, 83.25);
    }

    #[tokio::test]
    async fn test_alias_maps_upstream_symbol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("symbol".into(), "SPY".into()))
            .with_body(r#"{"Global Quote": {"05. price": "585.20"}}"#)
            .create_async()
            .await;

        let aliases = HashMap::from([("^GSPC".to_string(), "SPY".to_string())]);
        let data = provider(&server)
            .with_aliases(aliases)
            .fetch_quotes(&symbols(&["^GSPC"]))
            .await
            .unwrap();
        mock.assert_async().await;

        // 응답은 요청 심볼 기준, 실제 조회 심볼은 따로 기록
        assert_eq!(data["^GSPC"].symbol, "^GSPC");
        assert_eq!(data["^GSPC"].proxy_symbol.as_deref(), Some("SPY"));
        assert!(data["^GSPC"].change_percent.is_none());
    }

    #[tokio::test]
    async fn test_note_means_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_body(r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#)
            .expect(1)
            .create_async()
            .await;

        let err = provider(&server)
            .fetch_quotes(&symbols(&["IBM", "MSFT", "AAPL"]))
            .await
            .unwrap_err();

        // 한도 초과 이후 나머지 심볼은 요청하지 않음
        mock.assert_async().await;
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_overview_partial_batch() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "OVERVIEW".into()),
                Matcher::UrlEncoded("symbol".into(), "IBM".into()),
            ]))
            .with_body(
                r#"{"Symbol": "IBM", "MarketCapitalization": "190000000000", "PERatio": "22.1",
                    "PriceToBookRatio": "7.5", "ReturnOnEquityTTM": "0.35",
                    "ProfitMargin": "0.12", "OperatingMarginTTM": "None"}"#,
            )
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "OVERVIEW".into()),
                Matcher::UrlEncoded("symbol".into(), "NOPE".into()),
            ]))
            .with_body("{}")
            .create_async()
            .await;

        let data = provider(&server)
            .fetch_fundamentals(&symbols(&["IBM", "NOPE"]))
            .await
            .unwrap();

        assert_eq!(data.len(), 1);
        let ibm = &data["IBM"];
        assert_eq!(ibm.market_cap, Some(190_000_000_000.0));
        assert!((ibm.roe.unwrap() - 35.0).abs() < 1e-9);
        assert!(ibm.operating_margin.is_none());
        assert!(ibm.debt_to_equity.is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = provider(&server)
            .fetch_quotes(&symbols(&["IBM"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::FetchError(_)));
    }

    #[test]
    fn test_from_config_requires_key_and_enabled() {
        let config = AlphaVantageConfig::default();
        assert!(AlphaVantageProvider::from_config(&config).unwrap().is_none());

        let config = AlphaVantageConfig {
            api_key: Some(SecretString::new("k".into())),
            enabled: false,
            ..Default::default()
        };
        assert!(AlphaVantageProvider::from_config(&config).unwrap().is_none());

        let config = AlphaVantageConfig {
            enabled: true,
            ..config
        };
        assert!(AlphaVantageProvider::from_config(&config).unwrap().is_some());
    }
}
