//! 펀더멘털 배치 endpoint.
//!
//! PER, PBR, 시가총액, ROE, 부채비율, 마진을 종목별로 제공합니다.
//! 하루 단위로 캐시되며, 일부 종목 실패는 `failed_symbols`로만 보고합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use feed_core::FundamentalsRecord;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 배치 요청당 최대 심볼 수.
pub const MAX_BATCH_SYMBOLS: usize = 50;

/// 펀더멘털 배치 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct FundamentalsRequest {
    /// 종목 심볼 목록 (예: ["RELIANCE.NS", "TCS.NS"])
    #[validate(length(min = 1, max = 50, message = "심볼은 1-50개 사이여야 합니다"))]
    pub symbols: Vec<String>,
}

/// 펀더멘털 배치 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct FundamentalsResponse {
    /// 심볼별 펀더멘털
    pub fundamentals: HashMap<String, FundamentalsRecord>,
    /// 데이터를 얻지 못한 심볼 (요청 순서)
    pub failed_symbols: Vec<String>,
    /// 심볼별 데이터 출처 ("cache" | 제공자 이름 | "stale")
    pub sources: HashMap<String, String>,
    /// 마지막 정상 사본이 포함되었는지 여부
    pub stale: bool,
    /// 응답 생성 시각 (ISO 8601)
    pub timestamp: String,
}

/// 검증 에러를 한 줄 메시지로 합칩니다.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// 펀더멘털 배치 조회.
///
/// POST /api/v1/fundamentals/batch
pub async fn get_fundamentals_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FundamentalsRequest>, JsonRejection>,
) -> ApiResult<Json<FundamentalsResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::invalid_input(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::invalid_input(validation_message(&e)))?;

    let started = Instant::now();
    let batch = state
        .service
        .fetch_batch::<FundamentalsRecord>(&request.symbols)
        .await?;

    let sources = batch
        .sources
        .iter()
        .map(|(symbol, source)| (symbol.clone(), source.to_string()))
        .collect();

    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        requested = batch.symbols.len(),
        fetched = batch.records.len(),
        failed = batch.failed_symbols.len(),
        "펀더멘털 배치 조회 완료"
    );

    Ok(Json(FundamentalsResponse {
        stale: batch.is_stale(),
        failed_symbols: batch.failed_symbols,
        fundamentals: batch.records,
        sources,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// 펀더멘털 라우터 생성.
pub fn fundamentals_router() -> Router<Arc<AppState>> {
    Router::new().route("/batch", post(get_fundamentals_batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorResponse;
    use crate::state::{create_test_state, create_test_state_with, StaticProvider};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    async fn post_batch(state: Arc<AppState>, body: &str) -> Response {
        fundamentals_router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/batch")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_batch_reports_failed_symbols() {
        let state = Arc::new(create_test_state());
        let response = post_batch(state, r#"{"symbols": ["AAPL", "NOPE", "MSFT"]}"#).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: FundamentalsResponse = json(response).await;
        assert_eq!(body.fundamentals.len(), 2);
        assert_eq!(body.fundamentals["AAPL"].pe_ratio, Some(19.0));
        assert_eq!(body.failed_symbols, vec!["NOPE".to_string()]);
        assert_eq!(body.sources["MSFT"], "yahoo");
        assert!(!body.stale);
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let primary = StaticProvider::new("yahoo", &[("AAPL", 190.0)]);
        let state = Arc::new(create_test_state_with(primary.clone(), None));

        let first = post_batch(state.clone(), r#"{"symbols": ["AAPL"]}"#).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = post_batch(state, r#"{"symbols": ["AAPL"]}"#).await;

        let body: FundamentalsResponse = json(second).await;
        assert_eq!(body.sources["AAPL"], "cache");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_symbols_is_422() {
        let state = Arc::new(create_test_state());
        let response = post_batch(state, r#"{"symbols": []}"#).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let error: ApiErrorResponse = json(response).await;
        assert_eq!(error.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_too_many_symbols_is_422() {
        let symbols: Vec<String> = (0..=MAX_BATCH_SYMBOLS).map(|i| format!("S{i}")).collect();
        let body = serde_json::json!({ "symbols": symbols }).to_string();

        let state = Arc::new(create_test_state());
        let response = post_batch(state, &body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_body_is_422() {
        let state = Arc::new(create_test_state());
        let response = post_batch(state, r#"{"tickers": "AAPL"}"#).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let error: ApiErrorResponse = json(response).await;
        assert_eq!(error.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_blank_symbols_only_is_422() {
        let state = Arc::new(create_test_state());
        let response = post_batch(state, r#"{"symbols": ["  ", ""]}"#).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_provider_down_is_503() {
        let state = Arc::new(create_test_state_with(StaticProvider::down("yahoo"), None));
        let response = post_batch(state, r#"{"symbols": ["AAPL"]}"#).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");

        let error: ApiErrorResponse = json(response).await;
        assert_eq!(error.code(), "SERVICE_UNAVAILABLE");
        assert_eq!(error.error.details["failed_symbols"][0], "AAPL");
    }
}
