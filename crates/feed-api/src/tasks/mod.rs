//! 백그라운드 태스크.

pub mod cache_janitor;

pub use cache_janitor::{start_cache_janitor, DEFAULT_PURGE_INTERVAL};
