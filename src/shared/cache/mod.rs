// Read-side cache (Redis or no-op)
pub mod keys;
pub mod redis_cache;

pub use redis_cache::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// 캐시 에러 (호출자는 경고만 남기고 무시한다)
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// 캐시 무효화 인터페이스
/// Read-through cache invalidation
///
/// 패턴은 glob 형식 (`home:*`, `user:42:*`).
/// 같은 패턴을 여러 번 무효화해도 결과는 같다.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// 패턴에 맞는 키 삭제, 삭제된 키 수 반환
    async fn invalidate(&self, patterns: &[String]) -> Result<u64, CacheError>;

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

/// 캐시가 없을 때 사용하는 no-op 구현
#[derive(Debug, Default, Clone)]
pub struct NoopCache;

#[async_trait]
impl CacheInvalidator for NoopCache {
    async fn invalidate(&self, _patterns: &[String]) -> Result<u64, CacheError> {
        Ok(0)
    }
}

/// 시작 시 캐시 구현 선택
/// Pick the cache implementation at startup
///
/// REDIS_URL 이 없거나 연결할 수 없으면 NoopCache.
pub async fn connect_cache(redis_url: Option<&str>) -> Arc<dyn CacheInvalidator> {
    let Some(url) = redis_url else {
        tracing::info!("REDIS_URL not set, cache invalidation disabled");
        return Arc::new(NoopCache);
    };

    match RedisCache::connect(url).await {
        Ok(cache) => {
            tracing::info!("connected to redis cache");
            Arc::new(cache)
        }
        Err(e) => {
            tracing::warn!(error = %e, "redis unavailable, cache invalidation disabled");
            Arc::new(NoopCache)
        }
    }
}

/// 무효화 실패는 경고만 남긴다 (변경 작업을 실패시키지 않음)
pub async fn invalidate_best_effort(cache: &dyn CacheInvalidator, patterns: &[String]) -> u64 {
    match cache.invalidate(patterns).await {
        Ok(count) => {
            tracing::debug!(?patterns, count, "cache invalidated");
            count
        }
        Err(e) => {
            tracing::warn!(?patterns, error = %e, "cache invalidation failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCache;

    #[async_trait]
    impl CacheInvalidator for FailingCache {
        async fn invalidate(&self, _patterns: &[String]) -> Result<u64, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let count = invalidate_best_effort(&FailingCache, &["home:*".to_string()]).await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn missing_url_selects_noop() {
        let cache = connect_cache(None).await;
        assert_eq!(cache.invalidate(&["game:*".to_string()]).await.unwrap(), 0);
        assert!(cache.get("admin:stats").await.unwrap().is_none());
    }
}
