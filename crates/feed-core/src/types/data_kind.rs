//! 캐시되는 데이터 종류 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 글로벌 컨텍스트(지수/원자재/환율) 캐시 기본 TTL (5분).
pub const DEFAULT_CONTEXT_TTL_SECS: u64 = 300;

/// 펀더멘털 캐시 기본 TTL (1일).
pub const DEFAULT_FUNDAMENTALS_TTL_SECS: u64 = 86_400;

/// 마지막 정상 데이터(stale 사본) 기본 보관 기간 (7일).
pub const DEFAULT_STALE_TTL_SECS: u64 = 604_800;

/// 캐시되는 데이터 종류.
///
/// 종류마다 고정된 TTL을 가지며, 캐시 키의 네임스페이스로도 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// 지수/원자재/환율 시세 배치
    Context,
    /// 종목 펀더멘털
    Fundamentals,
}

impl DataKind {
    /// 캐시 키에 사용하는 짧은 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Context => "context",
            DataKind::Fundamentals => "fundamentals",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 데이터 종류별 캐시 TTL 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    /// 글로벌 컨텍스트 TTL (초)
    pub context_secs: u64,
    /// 펀더멘털 TTL (초)
    pub fundamentals_secs: u64,
    /// stale 사본 보관 기간 (초)
    pub stale_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            context_secs: DEFAULT_CONTEXT_TTL_SECS,
            fundamentals_secs: DEFAULT_FUNDAMENTALS_TTL_SECS,
            stale_secs: DEFAULT_STALE_TTL_SECS,
        }
    }
}

impl CacheTtls {
    /// 데이터 종류에 해당하는 TTL.
    pub fn for_kind(&self, kind: DataKind) -> u64 {
        match kind {
            DataKind::Context => self.context_secs,
            DataKind::Fundamentals => self.fundamentals_secs,
        }
    }
}
