//! 글로벌 시장 컨텍스트.
//!
//! 미국 지수, VIX, 원자재, 환율, 아시아 지수 시세를 하나의 응답으로 조립합니다.
//!
//! # 심볼 매핑
//!
//! | 심볼 | 응답 키 |
//! |------|---------|
//! | `^GSPC` | `sp500` |
//! | `^IXIC` | `nasdaq` |
//! | `^DJI` | `dow_jones` |
//! | `^VIX` | `vix` |
//! | `GC=F` | `gold` |
//! | `USDINR=X` | `usd_inr` |
//! | `CL=F` | `crude_oil` |
//! | `^N225` | `nikkei` |
//! | `^HSI` | `hang_seng` |
//!
//! 각 키의 출처는 `sources`에, 다른 심볼로 대체 조회한 값(예: Alpha Vantage의
//! `^GSPC` → `SPY`)은 `proxies`에 기록됩니다. 대체 값은 지수 수준이 아니라
//! 대체 심볼의 가격입니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::Quote;
use crate::error::{FeedError, FeedResult};

/// 글로벌 컨텍스트 응답 키.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    Sp500,
    Nasdaq,
    DowJones,
    Vix,
    Gold,
    UsdInr,
    CrudeOil,
    Nikkei,
    HangSeng,
}

impl ContextKey {
    /// 응답에 항상 포함되어야 하는 키.
    pub const REQUIRED: [ContextKey; 7] = [
        ContextKey::Sp500,
        ContextKey::Nasdaq,
        ContextKey::DowJones,
        ContextKey::Vix,
        ContextKey::Gold,
        ContextKey::UsdInr,
        ContextKey::CrudeOil,
    ];

    /// 제공자 심볼을 응답 키로 변환합니다.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "^GSPC" => Some(ContextKey::Sp500),
            "^IXIC" => Some(ContextKey::Nasdaq),
            "^DJI" => Some(ContextKey::DowJones),
            "^VIX" => Some(ContextKey::Vix),
            "GC=F" => Some(ContextKey::Gold),
            "USDINR=X" => Some(ContextKey::UsdInr),
            "CL=F" => Some(ContextKey::CrudeOil),
            "^N225" => Some(ContextKey::Nikkei),
            "^HSI" => Some(ContextKey::HangSeng),
            _ => None,
        }
    }

    /// JSON 응답 키 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::Sp500 => "sp500",
            ContextKey::Nasdaq => "nasdaq",
            ContextKey::DowJones => "dow_jones",
            ContextKey::Vix => "vix",
            ContextKey::Gold => "gold",
            ContextKey::UsdInr => "usd_inr",
            ContextKey::CrudeOil => "crude_oil",
            ContextKey::Nikkei => "nikkei",
            ContextKey::HangSeng => "hang_seng",
        }
    }

    /// 누락 시 요청 전체를 실패시키는 키인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ContextKey::Sp500 | ContextKey::Nasdaq | ContextKey::Vix
        )
    }
}

/// 지수/원자재 시세.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// 현재가
    pub price: f64,
    /// 변동률 (%)
    pub change_percent: f64,
}

/// VIX 변동성 지수.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VixData {
    pub value: f64,
}

/// 환율.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForexData {
    /// 환율
    pub rate: f64,
    /// 변동률 (%)
    pub change_percent: f64,
}

/// 글로벌 컨텍스트 응답.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalContext {
    pub sp500: Option<MarketData>,
    pub nasdaq: Option<MarketData>,
    pub dow_jones: Option<MarketData>,
    pub vix: Option<VixData>,
    pub gold: Option<MarketData>,
    pub usd_inr: Option<ForexData>,
    pub crude_oil: Option<MarketData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nikkei: Option<MarketData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hang_seng: Option<MarketData>,
    /// 마지막 정상 데이터(stale)가 하나라도 포함되었는지 여부
    #[serde(default)]
    pub stale: bool,
    /// 응답 키별 출처 (`cache`, 제공자 이름, `stale`)
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
    /// 대체 심볼로 채워진 키 → 대체 심볼
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub proxies: BTreeMap<String, String>,
    /// 응답 생성 시각
    pub timestamp: DateTime<Utc>,
}

impl GlobalContext {
    fn set(&mut self, key: ContextKey, quote: &Quote) {
        if let Some(proxy) = &quote.proxy_symbol {
            self.proxies.insert(key.as_str().to_string(), proxy.clone());
        }
        let change_percent = quote.change_percent.unwrap_or(0.0);
        let market = || MarketData {
            price: quote.price,
            change_percent,
        };
        match key {
            ContextKey::Sp500 => self.sp500 = Some(market()),
            ContextKey::Nasdaq => self.nasdaq = Some(market()),
            ContextKey::DowJones => self.dow_jones = Some(market()),
            ContextKey::Vix => self.vix = Some(VixData { value: quote.price }),
            ContextKey::Gold => self.gold = Some(market()),
            ContextKey::UsdInr => {
                self.usd_inr = Some(ForexData {
                    rate: quote.price,
                    change_percent,
                })
            }
            ContextKey::CrudeOil => self.crude_oil = Some(market()),
            ContextKey::Nikkei => self.nikkei = Some(market()),
            ContextKey::HangSeng => self.hang_seng = Some(market()),
        }
    }

    fn has(&self, key: ContextKey) -> bool {
        match key {
            ContextKey::Sp500 => self.sp500.is_some(),
            ContextKey::Nasdaq => self.nasdaq.is_some(),
            ContextKey::DowJones => self.dow_jones.is_some(),
            ContextKey::Vix => self.vix.is_some(),
            ContextKey::Gold => self.gold.is_some(),
            ContextKey::UsdInr => self.usd_inr.is_some(),
            ContextKey::CrudeOil => self.crude_oil.is_some(),
            ContextKey::Nikkei => self.nikkei.is_some(),
            ContextKey::HangSeng => self.hang_seng.is_some(),
        }
    }

    /// 심볼의 데이터 출처를 기록합니다. 값이 채워진 키에만 기록됩니다.
    pub fn record_source(&mut self, symbol: &str, source: impl Into<String>) {
        if let Some(key) = ContextKey::from_symbol(symbol).filter(|k| self.has(*k)) {
            self.sources.insert(key.as_str().to_string(), source.into());
        }
    }

    /// 심볼별 시세로 컨텍스트를 조립합니다.
    ///
    /// 매핑되지 않은 심볼은 무시되며, 시세가 없거나 가격이 유한하지 않은
    /// 심볼은 `failed_symbols`에 기록됩니다.
    pub fn assemble<'a, I>(quotes: I, stale: bool) -> ContextAssembly
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Quote>)>,
    {
        let mut context = GlobalContext {
            stale,
            timestamp: Utc::now(),
            ..Default::default()
        };
        let mut failed_symbols = Vec::new();

        for (symbol, quote) in quotes {
            let Some(quote) = quote.filter(|q| q.price.is_finite()) else {
                failed_symbols.push(symbol.to_string());
                continue;
            };
            if let Some(key) = ContextKey::from_symbol(symbol) {
                context.set(key, quote);
            }
        }

        let missing_keys = ContextKey::REQUIRED
            .into_iter()
            .filter(|key| !context.has(*key))
            .collect();

        ContextAssembly {
            context,
            missing_keys,
            failed_symbols,
        }
    }
}

/// 조립 결과와 누락 정보.
#[derive(Debug, Clone)]
pub struct ContextAssembly {
    pub context: GlobalContext,
    /// 응답에 채워지지 않은 필수 키
    pub missing_keys: Vec<ContextKey>,
    /// 데이터를 얻지 못한 심볼
    pub failed_symbols: Vec<String>,
}

impl ContextAssembly {
    /// 치명적 키(sp500, nasdaq, vix)가 빠졌는지 확인합니다.
    pub fn missing_critical(&self) -> bool {
        self.missing_keys.iter().any(ContextKey::is_critical)
    }

    /// 누락된 키 이름 목록.
    pub fn missing_key_names(&self) -> Vec<&'static str> {
        self.missing_keys.iter().map(ContextKey::as_str).collect()
    }

    /// 치명적 키가 빠졌으면 서비스 불가 에러를 반환합니다.
    pub fn require_critical(self, retry_after_secs: u64) -> FeedResult<GlobalContext> {
        if self.missing_critical() {
            return Err(FeedError::ServiceUnavailable {
                message: "Critical market data unavailable".to_string(),
                retry_after_secs,
                details: serde_json::json!({
                    "missing": self.missing_key_names(),
                    "failed_symbols": self.failed_symbols,
                }),
            });
        }
        Ok(self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64, pct: Option<f64>) -> Quote {
        let mut q = Quote::new(symbol, price, Utc::now());
        q.change_percent = pct;
        q
    }

    #[test]
    fn test_assemble_full_context() {
        let quotes = [
            quote("^GSPC", 5845.2, Some(0.45)),
            quote("^IXIC", 18234.5, Some(0.62)),
            quote("^DJI", 44320.1, Some(0.28)),
            quote("^VIX", 13.45, Some(-2.0)),
            quote("GC=F", 2024.3, Some(-0.15)),
            quote("USDINR=X", 83.25, None),
            quote("CL=F", 78.45, Some(1.2)),
        ];
        let assembly =
            GlobalContext::assemble(quotes.iter().map(|q| (q.symbol.as_str(), Some(q))), false);

        assert!(assembly.missing_keys.is_empty());
        assert!(assembly.failed_symbols.is_empty());
        let ctx = assembly.require_critical(60).unwrap();
        assert_eq!(ctx.vix, Some(VixData { value: 13.45 }));
        assert_eq!(
            ctx.usd_inr,
            Some(ForexData {
                rate: 83.25,
                change_percent: 0.0
            })
        );
        assert!(ctx.nikkei.is_none());
    }

    #[test]
    fn test_missing_non_critical_is_null() {
        let sp = quote("^GSPC", 1.0, None);
        let nq = quote("^IXIC", 1.0, None);
        let vix = quote("^VIX", 1.0, None);
        let entries = vec![
            ("^GSPC", Some(&sp)),
            ("^IXIC", Some(&nq)),
            ("^VIX", Some(&vix)),
            ("GC=F", None),
        ];
        let assembly = GlobalContext::assemble(entries, true);
        assert!(!assembly.missing_critical());
        assert_eq!(assembly.failed_symbols, vec!["GC=F"]);
        assert!(assembly.missing_key_names().contains(&"gold"));

        let ctx = assembly.require_critical(60).unwrap();
        assert!(ctx.stale);
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json["gold"].is_null());
        assert!(json.get("nikkei").is_none());
    }

    #[test]
    fn test_missing_critical_is_error() {
        let nq = quote("^IXIC", 1.0, None);
        let entries = vec![("^GSPC", None), ("^IXIC", Some(&nq))];
        let err = GlobalContext::assemble(entries, false)
            .require_critical(30)
            .unwrap_err();

        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
        assert_eq!(err.retry_after_secs(), Some(30));
        let missing = err.details()["missing"].clone();
        assert!(missing.as_array().unwrap().iter().any(|k| k == "sp500"));
        assert!(missing.as_array().unwrap().iter().any(|k| k == "vix"));
    }

    #[test]
    fn test_proxy_and_source_recorded() {
        let sp = quote("^GSPC", 585.2, Some(0.4)).with_proxy_symbol("SPY");
        let nq = quote("^IXIC", 18_234.5, None);
        let entries = vec![("^GSPC", Some(&sp)), ("^IXIC", Some(&nq)), ("^VIX", None)];
        let mut ctx = GlobalContext::assemble(entries, false).context;

        ctx.record_source("^GSPC", "alpha_vantage");
        ctx.record_source("^IXIC", "cache");
        // 값이 없는 키와 매핑되지 않은 심볼은 기록하지 않음
        ctx.record_source("^VIX", "stale");
        ctx.record_source("AAPL", "yahoo");

        assert_eq!(ctx.proxies.len(), 1);
        assert_eq!(ctx.proxies["sp500"], "SPY");
        assert_eq!(ctx.sources.len(), 2);
        assert_eq!(ctx.sources["sp500"], "alpha_vantage");

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["proxies"]["sp500"], "SPY");
        assert_eq!(json["sources"]["nasdaq"], "cache");
    }

    #[test]
    fn test_no_proxies_omitted_from_json() {
        let sp = quote("^GSPC", 5845.2, None);
        let ctx = GlobalContext::assemble(vec![("^GSPC", Some(&sp))], false).context;
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json.get("proxies").is_none());
    }

    #[test]
    fn test_unmapped_symbol_ignored() {
        let other = quote("AAPL", 200.0, None);
        let assembly = GlobalContext::assemble(vec![("AAPL", Some(&other))], false);
        assert!(assembly.failed_symbols.is_empty());
        assert_eq!(assembly.missing_keys.len(), ContextKey::REQUIRED.len());
    }
}
