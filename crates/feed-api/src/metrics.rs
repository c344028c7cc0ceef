//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.
//! 캐시/업스트림/요청 한도 메트릭은 `feed-data`에서 같은 레코더로 기록됩니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// 라우트에 매칭되지 않은 요청의 경로 라벨.
pub const UNMATCHED_PATH: &str = "unmatched";

const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        // HTTP 요청 지속 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        // 업스트림 호출 지속 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("feed_upstream_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
}

/// Prometheus 메트릭 레코더를 전역으로 설치하고 핸들을 반환합니다.
///
/// # Errors
///
/// 레코더가 이미 설치되어 있거나 버킷 설정이 잘못되면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// 전역 설치 없이 렌더링용 핸들만 생성합니다.
pub fn detached_handle() -> Result<PrometheusHandle, BuildError> {
    Ok(builder()?.build_recorder().handle())
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

/// 메트릭 라벨로 쓸 경로.
///
/// 라우트 템플릿이 있으면 그대로 쓰고, 없으면 [`UNMATCHED_PATH`]로 묶어
/// 임의 경로가 라벨 카디널리티를 늘리지 않도록 합니다.
pub fn path_label(matched: Option<&str>) -> String {
    matched.unwrap_or(UNMATCHED_PATH).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_label_matched() {
        assert_eq!(
            path_label(Some("/api/v1/global-context")),
            "/api/v1/global-context"
        );
    }

    #[test]
    fn test_path_label_unmatched() {
        assert_eq!(path_label(None), UNMATCHED_PATH);
    }

    #[test]
    fn test_detached_handle_renders() {
        let handle = detached_handle().unwrap();
        // 전역 레코더가 아니므로 기록되지 않음
        record_http_request("GET", "/health");
        assert!(!handle.render().contains("http_requests_total"));
    }
}
