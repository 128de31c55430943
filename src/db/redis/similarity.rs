use crate::{
    db::{
        cache::{SimilarityCache, SimilaritySnapshot},
        redis::{Cache, CacheKey},
    },
    engine::SimilarityMatrix,
    error::AppResult,
};

const SNAPSHOT_TTL: u64 = 604800; // 1 week

/// Similarity cache stored as a JSON snapshot in Redis
#[derive(Clone)]
pub struct RedisSimilarityCache {
    cache: Cache,
}

impl RedisSimilarityCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl SimilarityCache for RedisSimilarityCache {
    async fn load(&self, fingerprint: &str) -> AppResult<Option<SimilarityMatrix>> {
        let key = CacheKey::Similarity(fingerprint.to_string());
        let Some(snapshot) = self.cache.get_json::<SimilaritySnapshot>(&key).await? else {
            tracing::debug!(key = %key, "Similarity snapshot cache miss");
            return Ok(None);
        };

        tracing::info!(
            key = %key,
            items = snapshot.item_ids.len(),
            built_at = %snapshot.built_at,
            "Similarity snapshot cache hit"
        );

        snapshot.into_matrix().map(Some)
    }

    async fn store(&self, fingerprint: &str, matrix: &SimilarityMatrix) -> AppResult<()> {
        let key = CacheKey::Similarity(fingerprint.to_string());
        let snapshot = SimilaritySnapshot::from_matrix(fingerprint, matrix);
        self.cache.set_json(&key, &snapshot, SNAPSHOT_TTL).await?;

        tracing::info!(key = %key, items = matrix.len(), "Stored similarity snapshot");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
