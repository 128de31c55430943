use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    data::Dataset,
    db::SimilarityCache,
    engine::{ranker, SimilarityMatrix, UtilityMatrix},
    error::{AppError, AppResult},
    models::{
        DuplicatePolicy, Movie, MovieDetails, PopularMovie, Rating, RatingStats, ScoredMovie,
    },
};

/// Item-item recommendation engine over one dataset snapshot
///
/// Holds the catalog, per-movie rating statistics and the similarity matrix.
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug)]
pub struct Recommender {
    movies: Vec<Movie>,
    movie_index: HashMap<i64, usize>,
    title_index: HashMap<String, i64>,
    stats: Vec<RatingStats>,
    stats_index: HashMap<i64, usize>,
    similarity: SimilarityMatrix,
    fingerprint: String,
}

impl Recommender {
    /// Computes the similarity matrix from scratch, without any cache
    pub fn compute(dataset: &Dataset, policy: DuplicatePolicy) -> Self {
        let utility = UtilityMatrix::build(&dataset.ratings, policy);
        let fingerprint = utility.fingerprint();
        let similarity = SimilarityMatrix::compute(&utility);
        Self::assemble(dataset, similarity, fingerprint)
    }

    /// Builds the engine, reusing a cached similarity matrix when one exists
    /// for this exact dataset
    ///
    /// A corrupt or mismatched snapshot is discarded and rebuilt. Failing to
    /// store the fresh matrix is logged and does not fail the build.
    pub async fn build(
        dataset: Arc<Dataset>,
        policy: DuplicatePolicy,
        cache: Option<Arc<dyn SimilarityCache>>,
    ) -> AppResult<Self> {
        let start = Instant::now();

        let utility = {
            let dataset = dataset.clone();
            tokio::task::spawn_blocking(move || UtilityMatrix::build(&dataset.ratings, policy))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
        };
        let fingerprint = utility.fingerprint();

        let cached = match &cache {
            Some(cache) => load_cached(cache.as_ref(), &fingerprint, &utility).await,
            None => None,
        };

        let similarity = match cached {
            Some(matrix) => matrix,
            None => {
                let matrix = tokio::task::spawn_blocking(move || SimilarityMatrix::compute(&utility))
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;

                if let Some(cache) = &cache {
                    if let Err(e) = cache.store(&fingerprint, &matrix).await {
                        tracing::warn!(
                            backend = cache.name(),
                            error = %e,
                            "Failed to persist similarity matrix"
                        );
                    }
                }

                matrix
            }
        };

        let recommender = Self::assemble(&dataset, similarity, fingerprint);

        tracing::info!(
            movies = recommender.movies.len(),
            rated_movies = recommender.similarity.len(),
            fingerprint = %recommender.fingerprint,
            build_time_ms = start.elapsed().as_millis(),
            "Recommender ready"
        );

        Ok(recommender)
    }

    fn assemble(dataset: &Dataset, similarity: SimilarityMatrix, fingerprint: String) -> Self {
        let movies = dataset.movies.clone();
        let movie_index = movies
            .iter()
            .enumerate()
            .map(|(i, m)| (m.item_id, i))
            .collect();

        // First catalog entry wins when titles repeat
        let mut title_index = HashMap::with_capacity(movies.len());
        for movie in &movies {
            title_index
                .entry(movie.title.clone())
                .or_insert(movie.item_id);
        }

        let stats = aggregate_stats(&dataset.ratings);
        let stats_index = stats
            .iter()
            .enumerate()
            .map(|(i, s)| (s.item_id, i))
            .collect();

        Self {
            movies,
            movie_index,
            title_index,
            stats,
            stats_index,
            similarity,
            fingerprint,
        }
    }

    /// Fingerprint of the utility matrix this engine was built from
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn similarity_matrix(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn movie(&self, item_id: i64) -> AppResult<&Movie> {
        self.movie_index
            .get(&item_id)
            .map(|&i| &self.movies[i])
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not in catalog", item_id)))
    }

    /// Exact title lookup
    pub fn find_by_title(&self, title: &str) -> AppResult<&Movie> {
        self.title_index
            .get(title)
            .and_then(|id| self.movie(*id).ok())
            .ok_or_else(|| AppError::NotFound(format!("No movie titled {:?}", title)))
    }

    pub fn stats(&self, item_id: i64) -> Option<RatingStats> {
        self.stats_index.get(&item_id).map(|&i| self.stats[i])
    }

    pub fn details(&self, item_id: i64) -> AppResult<MovieDetails> {
        Ok(MovieDetails {
            movie: self.movie(item_id)?.clone(),
            stats: self.stats(item_id),
        })
    }

    /// Ids of the `k` movies most similar to `item_id`
    pub fn top_k_similar(&self, item_id: i64, k: usize) -> AppResult<Vec<i64>> {
        Ok(self
            .ranked_similar(item_id, k)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Like [`Self::top_k_similar`], with titles and similarity scores
    pub fn top_k_similar_scored(&self, item_id: i64, k: usize) -> AppResult<Vec<ScoredMovie>> {
        self.ranked_similar(item_id, k)?
            .into_iter()
            .map(|(id, score)| {
                Ok(ScoredMovie {
                    item_id: id,
                    title: self.movie(id)?.title.clone(),
                    score,
                })
            })
            .collect()
    }

    fn ranked_similar(&self, item_id: i64, k: usize) -> AppResult<Vec<(i64, f64)>> {
        // Distinguish "never heard of it" from "known but never rated"
        self.movie(item_id)?;
        if !self.similarity.contains(item_id) {
            return Err(AppError::NotFound(format!(
                "Movie {} has no ratings to compare",
                item_id
            )));
        }
        ranker::top_k_similar(&self.similarity, item_id, k)
    }

    /// Ids of the best-rated movies passing both popularity thresholds
    pub fn top_k_popular(
        &self,
        k: usize,
        min_avg_rating: f64,
        min_rating_count: usize,
    ) -> AppResult<Vec<i64>> {
        Ok(
            ranker::top_k_popular(&self.stats, k, min_avg_rating, min_rating_count)?
                .into_iter()
                .map(|s| s.item_id)
                .collect(),
        )
    }

    /// Like [`Self::top_k_popular`], with titles and rounded statistics
    pub fn popular_movies(
        &self,
        k: usize,
        min_avg_rating: f64,
        min_rating_count: usize,
    ) -> AppResult<Vec<PopularMovie>> {
        ranker::top_k_popular(&self.stats, k, min_avg_rating, min_rating_count)?
            .into_iter()
            .map(|s| {
                Ok(PopularMovie {
                    item_id: s.item_id,
                    title: self.movie(s.item_id)?.title.clone(),
                    mean_rating: s.rounded_mean(),
                    rating_count: s.rating_count,
                })
            })
            .collect()
    }

    /// Cosine similarity between two rated movies
    pub fn similarity(&self, a: i64, b: i64) -> AppResult<f64> {
        self.similarity.similarity(a, b)
    }
}

/// Loads a snapshot and checks it covers exactly the current items
///
/// Every failure is downgraded to a miss so the caller recomputes.
async fn load_cached(
    cache: &dyn SimilarityCache,
    fingerprint: &str,
    utility: &UtilityMatrix,
) -> Option<SimilarityMatrix> {
    match cache.load(fingerprint).await {
        Ok(Some(matrix)) if matrix.item_ids() == utility.item_ids() => Some(matrix),
        Ok(Some(matrix)) => {
            tracing::warn!(
                backend = cache.name(),
                cached_items = matrix.len(),
                current_items = utility.item_ids().len(),
                "Cached similarity matrix does not match the dataset, rebuilding"
            );
            None
        }
        Ok(None) => {
            tracing::info!(backend = cache.name(), "No cached similarity matrix, computing");
            None
        }
        Err(AppError::CacheCorrupt(reason)) => {
            tracing::warn!(
                backend = cache.name(),
                reason = %reason,
                "Cached similarity matrix is corrupt, rebuilding"
            );
            None
        }
        Err(e) => {
            tracing::warn!(
                backend = cache.name(),
                error = %e,
                "Similarity cache unavailable, computing"
            );
            None
        }
    }
}

/// Mean and count per movie over every raw rating row, ordered by movie id
fn aggregate_stats(ratings: &[Rating]) -> Vec<RatingStats> {
    let mut totals: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for r in ratings {
        let entry = totals.entry(r.item_id).or_insert((0.0, 0));
        entry.0 += r.rating;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .map(|(item_id, (sum, count))| RatingStats {
            item_id,
            mean_rating: sum / count as f64,
            rating_count: count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cache::MockSimilarityCache;

    fn dataset() -> Dataset {
        let movies = vec![
            Movie::new(1, "Toy Story (1995)", "Adventure|Animation"),
            Movie::new(2, "Jumanji (1995)", "Adventure|Fantasy"),
            Movie::new(3, "Heat (1995)", "Action|Crime"),
            Movie::new(4, "Sabrina (1995)", "Comedy|Romance"),
            Movie::new(5, "Unrated Short (2001)", ""),
        ];
        let ratings = vec![
            Rating::new(1, 1, 5.0),
            Rating::new(1, 2, 5.0),
            Rating::new(2, 1, 1.0),
            Rating::new(2, 2, 1.0),
            Rating::new(3, 1, 3.0),
            Rating::new(3, 2, 3.0),
            Rating::new(1, 3, 4.0),
            Rating::new(4, 3, 2.0),
            Rating::new(1, 4, 4.0),
            Rating::new(2, 4, 4.0),
            Rating::new(3, 4, 4.0),
            Rating::new(4, 4, 4.0),
        ];
        Dataset::from_parts(movies, ratings).unwrap()
    }

    #[test]
    fn test_top_k_similar_excludes_seed() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        let ids = recommender.top_k_similar(1, 3).unwrap();

        assert_eq!(ids, vec![2, 3]);
        assert!(!ids.contains(&1));
    }

    #[test]
    fn test_degenerate_movie_not_recommended() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        for seed in [1, 2, 3] {
            assert!(!recommender.top_k_similar(seed, 3).unwrap().contains(&4));
        }
        // Movie 4 can still be asked about directly
        assert_eq!(recommender.top_k_similar(4, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_scored_results_carry_titles() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        let scored = recommender.top_k_similar_scored(1, 1).unwrap();

        assert_eq!(scored[0].item_id, 2);
        assert_eq!(scored[0].title, "Jumanji (1995)");
        assert!((scored[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrated_and_unknown_movies_are_not_found() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        assert!(matches!(
            recommender.top_k_similar(5, 3),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            recommender.top_k_similar(42, 3),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            recommender.similarity(1, 42),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_by_title() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        assert_eq!(recommender.find_by_title("Heat (1995)").unwrap().item_id, 3);
        assert!(recommender.find_by_title("heat (1995)").is_err());
    }

    #[test]
    fn test_details_include_stats() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);

        let details = recommender.details(3).unwrap();
        let stats = details.stats.unwrap();
        assert_eq!(stats.rating_count, 2);
        assert_eq!(stats.mean_rating, 3.0);

        assert!(recommender.details(5).unwrap().stats.is_none());
    }

    #[test]
    fn test_popular_thresholds() {
        let recommender = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        // Movie 4 averages 4.0 over 4 ratings; 1 and 2 average 3.0
        assert_eq!(recommender.top_k_popular(5, 3.5, 3).unwrap(), vec![4]);
        assert_eq!(recommender.top_k_popular(5, 3.5, 4).unwrap(), Vec::<i64>::new());

        let popular = recommender.popular_movies(5, 2.0, 1).unwrap();
        let ids: Vec<i64> = popular.iter().map(|p| p.item_id).collect();
        assert_eq!(ids, vec![4, 1, 2, 3]);
        assert_eq!(popular[0].title, "Sabrina (1995)");
    }

    #[test]
    fn test_aggregate_stats_counts_duplicates() {
        let stats = aggregate_stats(&[
            Rating::new(1, 7, 2.0),
            Rating::new(1, 7, 4.0),
            Rating::new(2, 7, 3.0),
        ]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].rating_count, 3);
        assert_eq!(stats[0].mean_rating, 3.0);
    }

    #[tokio::test]
    async fn test_build_uses_cached_matrix() {
        let dataset = dataset();
        let fresh = Recommender::compute(&dataset, DuplicatePolicy::Mean);
        let cached_matrix = fresh.similarity_matrix().clone();
        let expected_fingerprint = fresh.fingerprint().to_string();

        let mut cache = MockSimilarityCache::new();
        cache
            .expect_load()
            .withf(move |fp| fp == expected_fingerprint)
            .times(1)
            .returning(move |_| Ok(Some(cached_matrix.clone())));
        cache.expect_store().never();
        cache.expect_name().return_const("mock");

        let recommender = Recommender::build(
            Arc::new(dataset),
            DuplicatePolicy::Mean,
            Some(Arc::new(cache)),
        )
        .await
        .unwrap();

        assert_eq!(recommender.similarity_matrix(), fresh.similarity_matrix());
        assert_eq!(
            recommender.top_k_similar(3, 3).unwrap(),
            fresh.top_k_similar(3, 3).unwrap()
        );
    }

    #[tokio::test]
    async fn test_build_computes_and_stores_on_miss() {
        let mut cache = MockSimilarityCache::new();
        cache.expect_load().times(1).returning(|_| Ok(None));
        cache
            .expect_store()
            .withf(|_, matrix| matrix.len() == 4)
            .times(1)
            .returning(|_, _| Ok(()));
        cache.expect_name().return_const("mock");

        let recommender = Recommender::build(
            Arc::new(dataset()),
            DuplicatePolicy::Mean,
            Some(Arc::new(cache)),
        )
        .await
        .unwrap();

        assert_eq!(recommender.similarity_matrix().len(), 4);
    }

    #[tokio::test]
    async fn test_build_rebuilds_on_corrupt_cache() {
        let mut cache = MockSimilarityCache::new();
        cache
            .expect_load()
            .returning(|_| Err(AppError::CacheCorrupt("truncated".to_string())));
        cache.expect_store().times(1).returning(|_, _| Ok(()));
        cache.expect_name().return_const("mock");

        let recommender = Recommender::build(
            Arc::new(dataset()),
            DuplicatePolicy::Mean,
            Some(Arc::new(cache)),
        )
        .await
        .unwrap();

        let fresh = Recommender::compute(&dataset(), DuplicatePolicy::Mean);
        assert!(recommender
            .similarity_matrix()
            .approx_eq(fresh.similarity_matrix(), 1e-9));
    }

    #[tokio::test]
    async fn test_build_rejects_snapshot_for_other_items() {
        let stale = SimilarityMatrix::compute(&UtilityMatrix::build(
            &[Rating::new(1, 1, 4.0), Rating::new(1, 2, 3.0)],
            DuplicatePolicy::Mean,
        ));

        let mut cache = MockSimilarityCache::new();
        cache
            .expect_load()
            .returning(move |_| Ok(Some(stale.clone())));
        cache.expect_store().times(1).returning(|_, _| Ok(()));
        cache.expect_name().return_const("mock");

        let recommender = Recommender::build(
            Arc::new(dataset()),
            DuplicatePolicy::Mean,
            Some(Arc::new(cache)),
        )
        .await
        .unwrap();

        assert_eq!(recommender.similarity_matrix().item_ids(), &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_build_survives_store_failure() {
        let mut cache = MockSimilarityCache::new();
        cache.expect_load().returning(|_| Ok(None));
        cache
            .expect_store()
            .returning(|_, _| Err(AppError::Internal("disk full".to_string())));
        cache.expect_name().return_const("mock");

        let result = Recommender::build(
            Arc::new(dataset()),
            DuplicatePolicy::Mean,
            Some(Arc::new(cache)),
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_build_survives_unreachable_redis() {
        use crate::db::{create_redis_client, Cache, RedisSimilarityCache};

        // Nothing listens on port 1: load and store both fail
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let cache: Arc<dyn SimilarityCache> = Arc::new(RedisSimilarityCache::new(Cache::new(client)));

        let recommender = Recommender::build(Arc::new(dataset()), DuplicatePolicy::Mean, Some(cache))
            .await
            .unwrap();
        assert_eq!(recommender.similarity_matrix().len(), 4);
    }

    #[test]
    fn test_build_without_cache_blocking() {
        let recommender = tokio_test::block_on(Recommender::build(
            Arc::new(dataset()),
            DuplicatePolicy::LastWriteWins,
            None,
        ))
        .unwrap();
        assert_eq!(recommender.top_k_similar(2, 1).unwrap(), vec![1]);
    }
}
