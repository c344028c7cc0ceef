//! # Feed Core
//!
//! 시장 데이터 프록시의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 프록시 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시세(Quote) 및 펀더멘털(FundamentalsRecord) 스냅샷
//! - 글로벌 컨텍스트 응답 구조체
//! - 데이터 종류별 캐시 TTL 정의
//! - 에러 분류 (요청 한도 초과, 제공자 장애, 서비스 불가 등)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
