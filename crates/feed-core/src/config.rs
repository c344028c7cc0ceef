//! 설정 관리.
//!
//! 기본값 → 설정 파일 → 환경 변수 순으로 설정을 병합합니다.
//! 환경 변수는 `FEED__SECTION__KEY` 형식을 사용합니다
//! (예: `FEED__YAHOO__RATE_LIMIT_PER_MINUTE=50`).

use std::collections::HashMap;
use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::types::{
    parse_symbol_list, CacheTtls, DEFAULT_CONTEXT_TTL_SECS, DEFAULT_FUNDAMENTALS_TTL_SECS,
    DEFAULT_STALE_TTL_SECS,
};

/// 글로벌 컨텍스트 기본 심볼.
pub const DEFAULT_CONTEXT_SYMBOLS: &str = "^GSPC,^IXIC,^DJI,^VIX,GC=F,USDINR=X,CL=F,^N225,^HSI";

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// Yahoo Finance 설정
    pub yahoo: YahooConfig,
    /// Alpha Vantage 설정
    pub alpha_vantage: AlphaVantageConfig,
    /// 캐시 설정
    pub cache: CacheConfig,
    /// 글로벌 컨텍스트 설정
    pub global_context: GlobalContextConfig,
    /// 폴백 설정
    pub fallback: FallbackConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 헬스 체크에 노출되는 서비스 이름
    pub service_name: String,
    /// 요청 전체 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8014,
            service_name: "yahoo-services".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Yahoo Finance 제공자 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    pub enabled: bool,
    /// 분당 요청 한도
    pub rate_limit_per_minute: u32,
    /// 시간당 요청 한도 (미설정 시 제한 없음)
    pub rate_limit_per_hour: Option<u32>,
    /// 일일 요청 한도 (미설정 시 제한 없음)
    pub rate_limit_per_day: Option<u32>,
    /// 업스트림 호출 타임아웃 (초)
    pub timeout_secs: u64,
    /// 펀더멘털 조회 시 거래소 접미사가 없는 심볼에 붙일 접미사 (빈 문자열이면 변환 안 함)
    pub indian_symbol_suffix: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_minute: 100,
            rate_limit_per_hour: None,
            rate_limit_per_day: None,
            timeout_secs: 10,
            indian_symbol_suffix: ".NS".to_string(),
        }
    }
}

/// Alpha Vantage 제공자 설정.
///
/// API 키가 없으면 보조 제공자는 비활성 상태로 남습니다.
#[derive(Deserialize)]
#[serde(default)]
pub struct AlphaVantageConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub enabled: bool,
    /// 분당 요청 한도 (무료 플랜 기준 5)
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_day: Option<u32>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// 요청 심볼 → Alpha Vantage 심볼 별칭 (예: `"^GSPC" = "SPY"`)
    pub symbol_aliases: HashMap<String, String>,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: false,
            rate_limit_per_minute: 5,
            rate_limit_per_day: None,
            base_url: "https://www.alphavantage.co".to_string(),
            timeout_secs: 10,
            symbol_aliases: HashMap::new(),
        }
    }
}

impl AlphaVantageConfig {
    /// 활성화되어 있고 API 키가 있는지 확인합니다.
    pub fn is_configured(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

impl std::fmt::Debug for AlphaVantageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("enabled", &self.enabled)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("rate_limit_per_day", &self.rate_limit_per_day)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("symbol_aliases", &self.symbol_aliases)
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .map(|s| SecretString::new(s.into())))
}

/// 캐시 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_url: String,
    /// false면 프로세스 내 메모리 캐시를 사용합니다
    pub redis_enabled: bool,
    /// 글로벌 컨텍스트 TTL (초)
    pub context_ttl_secs: u64,
    /// 펀더멘털 TTL (초)
    pub fundamentals_ttl_secs: u64,
    /// 마지막 정상 데이터 보존 기간 (초)
    pub stale_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/3".to_string(),
            redis_enabled: true,
            context_ttl_secs: DEFAULT_CONTEXT_TTL_SECS,
            fundamentals_ttl_secs: DEFAULT_FUNDAMENTALS_TTL_SECS,
            stale_ttl_secs: DEFAULT_STALE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            context_secs: self.context_ttl_secs,
            fundamentals_secs: self.fundamentals_ttl_secs,
            stale_secs: self.stale_ttl_secs,
        }
    }
}

/// 글로벌 컨텍스트 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalContextConfig {
    /// 쉼표로 구분된 심볼 목록
    pub symbols: String,
}

impl Default for GlobalContextConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_CONTEXT_SYMBOLS.to_string(),
        }
    }
}

impl GlobalContextConfig {
    /// 정규화된 심볼 목록.
    pub fn symbol_list(&self) -> Vec<String> {
        parse_symbol_list(&self.symbols)
    }
}

/// 폴백 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// 모든 단계 실패 시 클라이언트에게 권고할 재시도 대기 시간 (초)
    pub retry_after_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: 60,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("FEED")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // 관례적인 키 이름도 허용
            .set_override_option(
                "alpha_vantage.api_key",
                std::env::var("ALPHA_VANTAGE_API_KEY").ok(),
            )?
            .set_override_option(
                "yahoo.indian_symbol_suffix",
                std::env::var("INDIAN_SYMBOL_SUFFIX").ok(),
            )?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    ///
    /// `FEED_CONFIG`가 설정되어 있으면 해당 경로를 사용합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var("FEED_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load(path)
    }

    /// 캐시 TTL 묶음.
    pub fn ttls(&self) -> CacheTtls {
        self.cache.ttls()
    }
}
