//! 시장 데이터 프록시 API 서버.
//!
//! 설정을 로드하고 캐시, 제공자, 요청 한도를 묶어 Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use feed_api::metrics::setup_metrics_recorder;
use feed_api::routes::create_router;
use feed_api::state::AppState;
use feed_api::tasks::{start_cache_janitor, DEFAULT_PURGE_INTERVAL};
use feed_core::{init_logging_from_env, AppConfig, CacheConfig};
use feed_data::{
    AlphaVantageProvider, CacheStore, FeedService, MemoryCache, MetricsCache, ProviderSlot,
    RateLimitPolicy, RedisCache, YahooProvider,
};

/// 캐시 저장소 생성.
///
/// Redis 연결에 실패하면 메모리 캐시로 대체합니다. 메모리 캐시를 쓰는 경우
/// 정리 태스크용 핸들도 함께 반환합니다.
async fn create_cache_store(config: &CacheConfig) -> (Arc<dyn CacheStore>, Option<Arc<MemoryCache>>) {
    if config.redis_enabled {
        match RedisCache::connect(&config.redis_url).await {
            Ok(redis) => {
                info!("Connected to Redis successfully");
                return (Arc::new(redis), None);
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis, falling back to in-memory cache");
            }
        }
    } else {
        warn!("Redis disabled, using in-memory cache");
    }

    let memory = Arc::new(MemoryCache::new());
    (memory.clone(), Some(memory))
}

/// 제공자 슬롯과 캐시로 FeedService 생성.
fn create_feed_service(config: &AppConfig, store: Arc<dyn CacheStore>) -> anyhow::Result<FeedService> {
    let cache = Arc::new(MetricsCache::new(store));
    let mut builder = FeedService::builder(cache)
        .ttls(config.ttls())
        .retry_after_secs(config.fallback.retry_after_secs);

    if config.yahoo.enabled {
        let yahoo = YahooProvider::new()
            .context("Yahoo Finance 제공자 생성 실패")?
            .with_fundamentals_suffix(config.yahoo.indian_symbol_suffix.clone());
        let policy = RateLimitPolicy::per_minute(config.yahoo.rate_limit_per_minute)
            .with_hourly(config.yahoo.rate_limit_per_hour)
            .with_daily(config.yahoo.rate_limit_per_day);
        builder = builder.primary(ProviderSlot::new(
            Arc::new(yahoo),
            policy,
            Duration::from_secs(config.yahoo.timeout_secs),
        ));
        info!(
            rate_limit_per_minute = config.yahoo.rate_limit_per_minute,
            fundamentals_suffix = %config.yahoo.indian_symbol_suffix,
            "Yahoo Finance provider enabled"
        );
    } else {
        warn!("Yahoo Finance provider disabled");
    }

    let alpha_vantage = AlphaVantageProvider::from_config(&config.alpha_vantage)
        .context("Alpha Vantage 제공자 생성 실패")?;
    match alpha_vantage {
        Some(provider) => {
            let policy = RateLimitPolicy::per_minute(config.alpha_vantage.rate_limit_per_minute)
                .with_daily(config.alpha_vantage.rate_limit_per_day);
            builder = builder.secondary(Some(ProviderSlot::new(
                Arc::new(provider),
                policy,
                Duration::from_secs(config.alpha_vantage.timeout_secs),
            )));
            info!(
                rate_limit_per_minute = config.alpha_vantage.rate_limit_per_minute,
                "Alpha Vantage fallback enabled"
            );
        }
        None => {
            info!("Alpha Vantage not configured. Set ALPHA_VANTAGE_API_KEY to enable the fallback.");
        }
    }

    Ok(builder.build())
}

/// CORS 미들웨어 구성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 모든 origin을 허용합니다.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        // preflight 요청 캐시 시간
        .max_age(Duration::from_secs(3600))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    init_logging_from_env().map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    let config = AppConfig::load_default().context("설정 로드 실패")?;
    info!(
        service = %config.server.service_name,
        alpha_vantage = ?config.alpha_vantage,
        "Starting feed API server..."
    );

    let metrics_handle = setup_metrics_recorder().context("Prometheus 레코더 설치 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "소켓 주소가 유효하지 않습니다: {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let shutdown_token = CancellationToken::new();

    let (store, memory_cache) = create_cache_store(&config.cache).await;
    let janitor = memory_cache.map(|cache| {
        start_cache_janitor(cache, DEFAULT_PURGE_INTERVAL, shutdown_token.clone())
    });

    let service = Arc::new(create_feed_service(&config, store)?);
    let state = Arc::new(AppState::new(service, &config));

    info!(
        version = %state.version,
        cache = state.service.cache().backend(),
        yahoo = state.yahoo_available(),
        alpha_vantage = state.alpha_vantage_available(),
        context_symbols = state.context_symbols.len(),
        "Service connections status"
    );

    let app = create_router(
        state,
        metrics_handle,
        Duration::from_secs(config.server.request_timeout_secs),
    )
    .layer(cors_layer());

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("{addr} 바인딩 실패"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if let Some(handle) = janitor {
        if tokio::time::timeout(Duration::from_secs(10), handle).await.is_err() {
            warn!("Cleanup timeout, forcing shutdown");
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    // 모든 백그라운드 태스크에 종료 시그널 전파
    shutdown_token.cancel();
}
