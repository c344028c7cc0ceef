//! 프록시 도메인 모델.
//!
//! - [`quote`]: 단일 심볼 시세 스냅샷
//! - [`fundamentals`]: 단일 종목 펀더멘털 스냅샷
//! - [`context`]: 글로벌 컨텍스트 응답 조립

pub mod context;
pub mod fundamentals;
pub mod quote;

pub use context::*;
pub use fundamentals::*;
pub use quote::*;
