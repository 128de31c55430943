pub mod cache;
pub mod file;
pub mod redis;

pub use cache::{SimilarityCache, SimilaritySnapshot};
pub use file::FileSimilarityCache;
pub use self::redis::{create_redis_client, Cache, CacheKey, RedisSimilarityCache};
