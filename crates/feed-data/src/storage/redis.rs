//! Redis 캐시 구현.

use std::sync::Arc;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::info;

use super::CacheStore;
use crate::error::{DataError, Result};

/// Redis 연결 래퍼.
#[derive(Clone)]
pub struct RedisCache {
    connection: Arc<RwLock<MultiplexedConnection>>,
}

impl RedisCache {
    /// 새로운 Redis 연결을 생성합니다.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to Redis...");

        let client = Client::open(url).map_err(|e| DataError::CacheError(e.to_string()))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DataError::CacheError(e.to_string()))?;

        info!("Redis connection established");

        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.write().await;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.write().await;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.write().await;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.connection.write().await;
        // -2: 키 없음, -1: 만료 없음
        let ttl: i64 = conn.ttl(key).await?;
        Ok(match ttl {
            -2 => None,
            t if t < 0 => Some(u64::MAX),
            t => Some(t as u64),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection.write().await;
        let result: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(result == "PONG")
    }
}
