use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{
    config::Config,
    data::Dataset,
    db::SimilarityCache,
    error::{AppError, AppResult},
    services::Recommender,
};

/// Where the engine's ratings and catalog come from
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Files {
        ratings: PathBuf,
        movies: PathBuf,
        links: Option<PathBuf>,
    },
    InMemory(Arc<Dataset>),
}

/// Shared application state
///
/// The recommender is built lazily, at most once, by whichever caller gets
/// there first. Concurrent callers wait on the same build; a failed build
/// leaves the slot empty so the next caller retries.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    source: DatasetSource,
    cache: Option<Arc<dyn SimilarityCache>>,
    recommender: OnceCell<Arc<Recommender>>,
}

impl AppState {
    /// State that loads the dataset files named in `config`
    pub fn new(config: Config, cache: Option<Arc<dyn SimilarityCache>>) -> Self {
        let source = DatasetSource::Files {
            ratings: PathBuf::from(&config.ratings_path),
            movies: PathBuf::from(&config.movies_path),
            links: config.links_path.as_ref().map(PathBuf::from),
        };
        Self::with_source(config, source, cache)
    }

    pub fn with_source(
        config: Config,
        source: DatasetSource,
        cache: Option<Arc<dyn SimilarityCache>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                source,
                cache,
                recommender: OnceCell::new(),
            }),
        }
    }

    /// State around an engine that is already built
    pub fn from_recommender(config: Config, recommender: Arc<Recommender>) -> Self {
        let source = DatasetSource::InMemory(Arc::new(Dataset::default()));
        Self {
            inner: Arc::new(AppStateInner {
                config,
                source,
                cache: None,
                recommender: OnceCell::new_with(Some(recommender)),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn is_ready(&self) -> bool {
        self.inner.recommender.initialized()
    }

    /// Returns the shared recommender, building it on first use
    pub async fn recommender(&self) -> AppResult<Arc<Recommender>> {
        self.inner
            .recommender
            .get_or_try_init(|| self.build_recommender())
            .await
            .cloned()
    }

    async fn build_recommender(&self) -> AppResult<Arc<Recommender>> {
        let dataset = match &self.inner.source {
            DatasetSource::InMemory(dataset) => dataset.clone(),
            DatasetSource::Files {
                ratings,
                movies,
                links,
            } => {
                let (ratings, movies, links) = (ratings.clone(), movies.clone(), links.clone());
                let dataset = tokio::task::spawn_blocking(move || -> AppResult<Dataset> {
                    let dataset = Dataset::load(ratings, movies)?;
                    match links {
                        Some(links) => dataset.with_links_file(links),
                        None => Ok(dataset),
                    }
                })
                .await
                .map_err(|e| AppError::Internal(e.to_string()))??;
                Arc::new(dataset)
            }
        };

        let recommender = Recommender::build(
            dataset,
            self.inner.config.duplicate_policy,
            self.inner.cache.clone(),
        )
        .await?;

        Ok(Arc::new(recommender))
    }
}
