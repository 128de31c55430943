use std::sync::Arc;

use reel_recs::{
    api::{create_router, AppState},
    config::{CacheBackend, Config},
    db::{create_redis_client, Cache, FileSimilarityCache, RedisSimilarityCache, SimilarityCache},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("reel_recs=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let cache = similarity_cache(&config)?;
    let state = AppState::new(config.clone(), cache);

    // Build the engine before accepting traffic
    let recommender = state.recommender().await?;
    tracing::info!(
        movies = recommender.movies().len(),
        fingerprint = %recommender.fingerprint(),
        "Recommender warmed up"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Picks the snapshot backend named in the configuration
fn similarity_cache(config: &Config) -> anyhow::Result<Option<Arc<dyn SimilarityCache>>> {
    let cache: Arc<dyn SimilarityCache> = match config.cache_backend {
        CacheBackend::File => Arc::new(FileSimilarityCache::new(&config.similarity_cache_path)),
        CacheBackend::Redis => {
            let client = create_redis_client(&config.redis_url)?;
            Arc::new(RedisSimilarityCache::new(Cache::new(client)))
        }
        CacheBackend::None => return Ok(None),
    };

    tracing::info!(backend = cache.name(), "Similarity cache configured");
    Ok(Some(cache))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
