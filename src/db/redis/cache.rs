use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

/// Keys this service writes to Redis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Similarity snapshot for the dataset with this fingerprint
    Similarity(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Similarity(fingerprint) => write!(f, "sim:{}", fingerprint),
        }
    }
}

/// Opens a Redis client; no connection is made until first use
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// JSON values in Redis, one multiplexed connection per call
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reads and decodes the value under `key`, `None` when absent
    ///
    /// A value that no longer decodes is [`AppError::CacheCorrupt`].
    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key.to_string()).await?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| AppError::CacheCorrupt(format!("undecodable value at {}: {}", key, e)))
        })
        .transpose()
    }

    /// Encodes `value` and writes it under `key` with a TTL in seconds
    ///
    /// Returns once Redis has acknowledged the write.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl_secs: u64,
    ) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("encoding value for {}: {}", key, e)))?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key.to_string(), json, ttl_secs).await?;

        tracing::debug!(key = %key, ttl_secs, "Wrote cache entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Nothing listens on port 1, so every call fails at connect time
    fn unreachable_cache() -> Cache {
        Cache::new(create_redis_client("redis://127.0.0.1:1").unwrap())
    }

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::Similarity("ab12cd".to_string());
        assert_eq!(key.to_string(), "sim:ab12cd");
    }

    #[test]
    fn test_create_redis_client_rejects_bad_url() {
        assert!(create_redis_client("not a url").is_err());
    }

    #[tokio::test]
    async fn test_set_reports_connection_failure() {
        let key = CacheKey::Similarity("unreachable".to_string());
        let result = unreachable_cache().set_json(&key, &[1.0, 2.0], 60).await;
        assert!(matches!(result, Err(AppError::Cache(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_round_trip() {
        let cache = Cache::new(create_redis_client(&redis_url()).unwrap());
        let key = CacheKey::Similarity("test_round_trip".to_string());

        cache.set_json(&key, &vec![0.5, 1.0], 60).await.unwrap();
        let value: Option<Vec<f64>> = cache.get_json(&key).await.unwrap();

        assert_eq!(value, Some(vec![0.5, 1.0]));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_missing_key_is_none() {
        let cache = Cache::new(create_redis_client(&redis_url()).unwrap());
        let key = CacheKey::Similarity("nonexistent_fingerprint_12345".to_string());

        let value: Option<Vec<f64>> = cache.get_json(&key).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_undecodable_value_is_corrupt() {
        let client = create_redis_client(&redis_url()).unwrap();
        let key = CacheKey::Similarity("test_undecodable".to_string());

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.set_ex(key.to_string(), "not json", 60).await.unwrap();

        let result: AppResult<Option<Vec<f64>>> = Cache::new(client).get_json(&key).await;
        assert!(matches!(result, Err(AppError::CacheCorrupt(_))));
    }
}
