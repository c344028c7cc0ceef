//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 캐시 및 업스트림 제공자 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 제공자 연결 실패
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// 외부 소스 데이터 가져오기 오류
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 응답 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 업스트림이 요청 한도 초과를 알림
    #[error("Upstream rate limited: {0}")]
    RateLimited(String),

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 데이터 없음
    #[error("No data: {0}")]
    NotFound(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DataError {
    /// 업스트림 요청 한도 초과로 인한 실패인지 확인합니다.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DataError::RateLimited(_))
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else if err.is_decode() {
            DataError::ParseError(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            DataError::RateLimited(err.to_string())
        } else {
            DataError::FetchError(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
