//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크
//! - `/status` - 요청 한도/캐시 통계
//! - `/metrics` - Prometheus 메트릭
//! - `/api/v1/global-context` - 글로벌 시장 컨텍스트
//! - `/api/v1/alpha-vantage/global-context` - Alpha Vantage 글로벌 컨텍스트
//! - `/api/v1/fundamentals/batch` - 펀더멘털 배치 조회

pub mod context;
pub mod fundamentals;
pub mod health;
pub mod status;

pub use context::{context_router, get_alpha_vantage_global_context, get_global_context};
pub use fundamentals::{fundamentals_router, FundamentalsRequest, FundamentalsResponse};
pub use health::{health_router, CacheHealth, HealthResponse};
pub use status::{status_router, StatusResponse};

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics_layer;
use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/status", status_router())
        .nest("/api/v1", context_router())
        .nest("/api/v1/fundamentals", fundamentals_router())
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// 메트릭/트레이스/타임아웃 레이어까지 포함한 전체 라우터.
///
/// 타임아웃을 넘긴 요청은 408로 응답합니다.
pub fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}
