//! 프록시 전반에서 사용되는 공통 타입.

mod data_kind;
mod symbol;

pub use data_kind::*;
pub use symbol::*;
