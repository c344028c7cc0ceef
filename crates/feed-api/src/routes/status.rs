//! 서비스 상태 endpoint.
//!
//! 제공자별 요청 한도 사용량과 캐시 적중률을 보여줍니다.

use axum::{extract::State, routing::get, Json, Router};
use feed_data::{CacheStats, RateLimiterStats};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// 서비스 상태 응답.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub uptime_secs: i64,
    /// 글로벌 컨텍스트 심볼
    pub context_symbols: Vec<String>,
    /// 모든 단계 실패 시 권고하는 재시도 대기 시간 (초)
    pub retry_after_secs: u64,
    /// 제공자별 요청 한도 (주 제공자 먼저)
    pub rate_limits: Vec<RateLimiterStats>,
    pub cache: CacheStats,
    pub timestamp: String,
}

/// 서비스 상태 조회.
///
/// GET /status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: state.service_name.clone(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        context_symbols: state.context_symbols.clone(),
        retry_after_secs: state.service.retry_after_secs(),
        rate_limits: state.service.limiter_stats().await,
        cache: state.service.cache_stats(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// 상태 라우터 생성.
pub fn status_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_reports_limiter_and_cache() {
        let state = Arc::new(create_test_state());
        state
            .service
            .global_context(&state.context_symbols)
            .await
            .unwrap();

        let response = status_router()
            .with_state(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status["rate_limits"][0]["provider"], "yahoo");
        assert_eq!(status["rate_limits"][0]["allowed"], 1);
        assert_eq!(status["rate_limits"][0]["windows"][0]["limit"], 100);
        assert_eq!(status["cache"]["backend"], "memory");
        assert_eq!(status["context_symbols"].as_array().unwrap().len(), 9);
    }
}
