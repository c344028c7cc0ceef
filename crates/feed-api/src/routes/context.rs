//! 글로벌 시장 컨텍스트 endpoint.
//!
//! 주요 지수, VIX, 금, 원유, USD/INR 환율을 하나의 응답으로 제공합니다.
//!
//! - `GET /api/v1/global-context`: 전체 폴백 체인 (캐시 → Yahoo → Alpha Vantage → stale)
//! - `GET /api/v1/alpha-vantage/global-context`: Alpha Vantage만 사용
//!
//! 응답의 `sources`는 키별 출처를, `proxies`는 ETF 등 대체 심볼로 채운 키를
//! 알려줍니다 (예: `"sp500": "SPY"`이면 `sp500.price`는 SPY 가격).

use axum::{extract::State, routing::get, Json, Router};
use feed_core::{FeedError, GlobalContext};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;

/// 글로벌 컨텍스트 조회.
///
/// GET /api/v1/global-context
pub async fn get_global_context(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GlobalContext>> {
    let started = Instant::now();
    let context = state.service.global_context(&state.context_symbols).await?;

    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        stale = context.stale,
        proxied = context.proxies.len(),
        "글로벌 컨텍스트 조회 완료"
    );
    Ok(Json(context))
}

/// Alpha Vantage 글로벌 컨텍스트 조회.
///
/// GET /api/v1/alpha-vantage/global-context
///
/// API 키가 설정되지 않았으면 501 `ALPHA_VANTAGE_NOT_CONFIGURED`를 반환합니다.
/// Alpha Vantage 캐시나 호출로 채우지 못하면 stale 사본 없이 503을 반환합니다.
pub async fn get_alpha_vantage_global_context(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GlobalContext>> {
    if !state.alpha_vantage_available() {
        return Err(FeedError::NotConfigured {
            code: "ALPHA_VANTAGE_NOT_CONFIGURED".to_string(),
            message: "Alpha Vantage is not configured. Set ALPHA_VANTAGE_API_KEY to enable."
                .to_string(),
        }
        .into());
    }

    let context = state
        .service
        .secondary_global_context(&state.context_symbols)
        .await?;
    Ok(Json(context))
}

/// 글로벌 컨텍스트 라우터 생성.
pub fn context_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/global-context", get(get_global_context))
        .route(
            "/alpha-vantage/global-context",
            get(get_alpha_vantage_global_context),
        )
}
