//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트는 같은 에러 본문을 반환합니다.
//!
//! ```json
//! {
//!   "error": {
//!     "code": "YAHOO_RATE_LIMIT_EXCEEDED",
//!     "message": "yahoo 요청 한도 초과 (42초 후 재시도)",
//!     "details": {"provider": "yahoo", "retry_after": 42}
//!   },
//!   "timestamp": "2025-01-31T12:00:00+00:00"
//! }
//! ```

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use feed_core::FeedError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

/// 에러 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// 에러 코드 (예: "SERVICE_UNAVAILABLE", "INVALID_INPUT")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 상세 정보
    pub details: Value,
}

/// 통합 API 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ErrorBody,
    /// 에러 발생 시각 (ISO 8601)
    pub timestamp: String,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (빈 details).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_details(code, message, serde_json::json!({}))
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details,
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// 에러 코드 반환.
    pub fn code(&self) -> &str {
        &self.error.code
    }

    /// 에러 메시지 반환.
    pub fn message(&self) -> &str {
        &self.error.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error.code, self.error.message)
    }
}

/// 핸들러 에러.
///
/// 상태 코드, 본문, 선택적 `Retry-After` 헤더를 함께 가집니다.
#[derive(Debug, Error)]
#[error("{status}: {body}")]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ApiErrorResponse) -> Self {
        Self {
            status,
            body,
            retry_after_secs: None,
        }
    }

    /// 요청 본문 검증 실패 (422).
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::from(FeedError::InvalidInput(message.into()))
    }
}

/// 에러 종류별 HTTP 상태 코드.
pub fn status_for(err: &FeedError) -> StatusCode {
    match err {
        FeedError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        FeedError::ServiceUnavailable { .. } | FeedError::CacheUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FeedError::ProviderUnavailable { .. } | FeedError::PartialData { .. } => {
            StatusCode::BAD_GATEWAY
        }
        FeedError::NotConfigured { .. } => StatusCode::NOT_IMPLEMENTED,
        FeedError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FeedError::Config(_) | FeedError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(code = %err.code(), error = %err, "요청 처리 실패");
        } else {
            warn!(code = %err.code(), error = %err, "요청 거부");
        }

        Self {
            status,
            retry_after_secs: err.retry_after_secs(),
            body: ApiErrorResponse::with_details(err.code(), err.to_string(), err.details()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                FeedError::RateLimited {
                    provider: "yahoo".into(),
                    retry_after_secs: 5,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                FeedError::ServiceUnavailable {
                    message: "down".into(),
                    retry_after_secs: 60,
                    details: serde_json::json!({}),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                FeedError::ProviderUnavailable {
                    provider: "yahoo".into(),
                    message: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                FeedError::NotConfigured {
                    code: "ALPHA_VANTAGE_NOT_CONFIGURED".into(),
                    message: "missing key".into(),
                },
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                FeedError::InvalidInput("empty".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                FeedError::Internal("oops".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn test_rate_limited_response_has_retry_after() {
        let err = ApiError::from(FeedError::RateLimited {
            provider: "yahoo".into(),
            retry_after_secs: 42,
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ApiErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code(), "YAHOO_RATE_LIMIT_EXCEEDED");
        assert_eq!(parsed.error.details["retry_after"], 42);
    }

    #[test]
    fn test_not_configured_has_no_retry_after() {
        let response = ApiError::from(FeedError::NotConfigured {
            code: "ALPHA_VANTAGE_NOT_CONFIGURED".into(),
            message: "Set ALPHA_VANTAGE_API_KEY".into(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
