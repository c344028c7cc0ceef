//! 시세 스냅샷.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 단일 심볼의 시세 스냅샷.
///
/// 캐시에 직렬화되어 저장되며, 만료 시 통째로 갱신됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 제공자 심볼 (예: "^GSPC", "GC=F")
    pub symbol: String,
    /// 현재가
    pub price: f64,
    /// 전일 대비 변동폭
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    /// 전일 대비 변동률 (%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    /// 전일 종가
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    /// 시세 기준 시각
    pub as_of: DateTime<Utc>,
    /// 다른 심볼로 대체 조회한 경우 실제 조회 심볼 (예: `^GSPC` 대신 `SPY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_symbol: Option<String>,
}

impl Quote {
    /// 현재가만으로 시세를 생성합니다.
    pub fn new(symbol: impl Into<String>, price: f64, as_of: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: None,
            change_percent: None,
            previous_close: None,
            as_of,
            proxy_symbol: None,
        }
    }

    /// 현재가와 전일 종가로 시세를 생성합니다.
    ///
    /// 전일 종가가 0이거나 유한하지 않으면 변동률은 계산하지 않습니다.
    pub fn from_closes(
        symbol: impl Into<String>,
        price: f64,
        previous_close: f64,
        as_of: DateTime<Utc>,
    ) -> Self {
        let mut quote = Self::new(symbol, price, as_of);
        if previous_close.is_finite() && previous_close != 0.0 {
            let change = price - previous_close;
            quote.change = Some(change);
            quote.change_percent = Some(change / previous_close * 100.0);
            quote.previous_close = Some(previous_close);
        }
        quote
    }

    /// 대체 조회 심볼을 기록합니다.
    #[must_use]
    pub fn with_proxy_symbol(mut self, proxy_symbol: impl Into<String>) -> Self {
        self.proxy_symbol = Some(proxy_symbol.into());
        self
    }

    /// 변동률을 직접 지정합니다.
    #[must_use]
    pub fn with_change_percent(mut self, change_percent: f64) -> Self {
        self.change_percent = Some(change_percent);
        self
    }
}
