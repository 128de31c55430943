pub mod cache;
pub mod similarity;

pub use cache::{create_redis_client, Cache, CacheKey};
pub use similarity::RedisSimilarityCache;
