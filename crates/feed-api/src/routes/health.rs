//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템에서 사용됩니다.
//! 캐시 장애는 서비스를 멈추지 않으므로 `degraded`로만 보고합니다.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "degraded")
    pub status: String,

    /// 서비스 이름
    pub service: String,

    /// Yahoo Finance 제공자 활성 여부
    pub yahoo_finance_available: bool,

    /// Alpha Vantage 제공자 설정 여부
    pub alpha_vantage_available: bool,

    /// 캐시 저장소 상태
    pub cache: CacheHealth,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
}

/// 캐시 저장소 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealth {
    /// 저장소 종류 ("redis" | "memory")
    pub backend: String,
    /// 상태 ("up" | "down")
    pub status: String,
}

/// 헬스 체크.
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache = state.service.cache();
    let cache_up = cache.health_check().await;

    let status = if cache_up && state.yahoo_available() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        service: state.service_name.clone(),
        yahoo_finance_available: state.yahoo_available(),
        alpha_vantage_available: state.alpha_vantage_available(),
        cache: CacheHealth {
            backend: cache.backend().to_string(),
            status: if cache_up { "up" } else { "down" }.to_string(),
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health_check))
}
