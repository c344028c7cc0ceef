//! 프록시 서비스의 에러 타입.
//!
//! 업스트림 제공자, 캐시, 폴백 체인에서 발생하는 에러를 분류합니다.
//! HTTP 상태 코드로의 변환은 `feed-api`에서 담당합니다.

use serde_json::Value;
use thiserror::Error;

/// 핵심 프록시 에러.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 제공자 요청 한도 초과
    #[error("{provider} 요청 한도 초과 ({retry_after_secs}초 후 재시도)")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// 제공자 장애 (네트워크, 타임아웃, 응답 파싱 실패 등)
    #[error("{provider} 사용 불가: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// 일부 심볼 데이터 누락
    #[error("일부 데이터 누락: {missing:?}")]
    PartialData { missing: Vec<String> },

    /// 캐시 저장소 사용 불가
    #[error("캐시 사용 불가: {0}")]
    CacheUnavailable(String),

    /// 신선한 데이터도 stale 캐시도 없음
    #[error("서비스 사용 불가: {message}")]
    ServiceUnavailable {
        message: String,
        retry_after_secs: u64,
        details: Value,
    },

    /// 선택 기능이 설정되지 않음
    #[error("설정되지 않음: {message}")]
    NotConfigured { code: String, message: String },

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 프록시 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 응답 본문에 들어가는 에러 코드.
    ///
    /// 요청 한도 초과는 제공자 이름을 접두어로 사용합니다
    /// (예: `YAHOO_RATE_LIMIT_EXCEEDED`).
    pub fn code(&self) -> String {
        match self {
            FeedError::RateLimited { provider, .. } => {
                format!("{}_RATE_LIMIT_EXCEEDED", provider_code(provider))
            }
            FeedError::ProviderUnavailable { provider, .. } => {
                format!("{}_API_ERROR", provider_code(provider))
            }
            FeedError::PartialData { .. } => "PARTIAL_DATA".to_string(),
            FeedError::CacheUnavailable(_) => "CACHE_ERROR".to_string(),
            FeedError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE".to_string(),
            FeedError::NotConfigured { code, .. } => code.clone(),
            FeedError::InvalidInput(_) => "INVALID_INPUT".to_string(),
            FeedError::Config(_) => "CONFIG_ERROR".to_string(),
            FeedError::Internal(_) => "INTERNAL_SERVER_ERROR".to_string(),
        }
    }

    /// 클라이언트에게 전달할 재시도 대기 시간 (초).
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            FeedError::RateLimited {
                retry_after_secs, ..
            }
            | FeedError::ServiceUnavailable {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// 에러 상세 정보 (JSON).
    pub fn details(&self) -> Value {
        match self {
            FeedError::RateLimited {
                provider,
                retry_after_secs,
            } => serde_json::json!({
                "provider": provider,
                "retry_after": retry_after_secs,
            }),
            FeedError::ProviderUnavailable { provider, message } => serde_json::json!({
                "provider": provider,
                "error": message,
            }),
            FeedError::PartialData { missing } => serde_json::json!({ "missing": missing }),
            FeedError::ServiceUnavailable { details, .. } => details.clone(),
            _ => serde_json::json!({}),
        }
    }

    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::RateLimited { .. }
                | FeedError::ProviderUnavailable { .. }
                | FeedError::ServiceUnavailable { .. }
                | FeedError::CacheUnavailable(_)
        )
    }
}

/// "alpha_vantage" → "ALPHA_VANTAGE"
fn provider_code(provider: &str) -> String {
    provider.replace(['-', ' '], "_").to_uppercase()
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for FeedError {
    fn from(err: config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}
