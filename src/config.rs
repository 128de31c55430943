use serde::Deserialize;

use crate::models::DuplicatePolicy;

/// Where the computed similarity matrix is persisted between runs
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    File,
    Redis,
    None,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// MovieLens-style ratings table (userId,movieId,rating,timestamp)
    #[serde(default = "default_ratings_path")]
    pub ratings_path: String,

    /// MovieLens-style movie catalog (movieId,title,genres)
    #[serde(default = "default_movies_path")]
    pub movies_path: String,

    /// Optional MovieLens-style links table (movieId,imdbId,tmdbId)
    #[serde(default)]
    pub links_path: Option<String>,

    /// Location of the on-disk similarity snapshot
    #[serde(default = "default_similarity_cache_path")]
    pub similarity_cache_path: String,

    #[serde(default = "default_cache_backend")]
    pub cache_backend: CacheBackend,

    /// Redis connection URL, used when `cache_backend` is `redis`
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// How repeated (user, movie) ratings collapse into one matrix cell
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Number of recommendations returned when a request omits `k`
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Answer cross-origin requests from any origin
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_ratings_path() -> String {
    "ml-latest-small/ratings.csv".to_string()
}

fn default_movies_path() -> String {
    "ml-latest-small/movies.csv".to_string()
}

fn default_similarity_cache_path() -> String {
    "similarity_df.csv".to_string()
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::File
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_top_k() -> usize {
    10
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_enable_cors() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Configuration pointing at explicit dataset files, defaults elsewhere
    pub fn for_dataset(ratings_path: impl Into<String>, movies_path: impl Into<String>) -> Self {
        Self {
            ratings_path: ratings_path.into(),
            movies_path: movies_path.into(),
            links_path: None,
            similarity_cache_path: default_similarity_cache_path(),
            cache_backend: CacheBackend::None,
            redis_url: default_redis_url(),
            duplicate_policy: DuplicatePolicy::default(),
            default_top_k: default_top_k(),
            host: default_host(),
            port: default_port(),
            enable_cors: default_enable_cors(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
