//! 펀더멘털 스냅샷.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 단일 종목의 펀더멘털 지표.
///
/// 제공자가 값을 주지 않는 지표는 `null`로 유지됩니다.
/// 퍼센트 지표(ROE, 마진)는 % 단위입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub symbol: String,

    /// 시가총액
    pub market_cap: Option<f64>,
    /// PER (trailing)
    pub pe_ratio: Option<f64>,
    /// PBR
    pub pb_ratio: Option<f64>,
    /// ROE (%)
    pub roe: Option<f64>,
    /// 부채비율 (debt / equity)
    pub debt_to_equity: Option<f64>,
    /// 순이익률 (%)
    pub profit_margin: Option<f64>,
    /// 영업이익률 (%)
    pub operating_margin: Option<f64>,

    /// 수집 시각
    pub fetched_at: DateTime<Utc>,
}

impl FundamentalsRecord {
    /// 빈 레코드를 생성합니다.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            fetched_at: Utc::now(),
            ..Default::default()
        }
    }

    /// 모든 지표가 비어 있는지 확인합니다.
    ///
    /// 제공자가 알 수 없는 심볼에 대해 빈 응답을 줄 때 실패로 취급하는 데 사용합니다.
    pub fn is_empty(&self) -> bool {
        self.market_cap.is_none()
            && self.pe_ratio.is_none()
            && self.pb_ratio.is_none()
            && self.roe.is_none()
            && self.debt_to_equity.is_none()
            && self.profit_margin.is_none()
            && self.operating_margin.is_none()
    }
}
