use crate::{
    engine::similarity::SimilarityMatrix,
    error::{AppError, AppResult},
    models::RatingStats,
};

/// The `k` items most similar to `seed`, best first
///
/// The seed itself is never returned. Equal scores are ordered by ascending
/// item id. Asking for more items than exist returns every other item.
///
/// Degenerate items (zero diagonal, no rating signal) are left out of every
/// other item's ranking. A degenerate seed still gets a ranking: every other
/// item at 0.0, in id order.
pub fn top_k_similar(
    matrix: &SimilarityMatrix,
    seed: i64,
    k: usize,
) -> AppResult<Vec<(i64, f64)>> {
    if k == 0 {
        return Err(AppError::InvalidInput("k must be at least 1".to_string()));
    }

    let row = matrix
        .row(seed)
        .ok_or_else(|| AppError::NotFound(format!("Movie {} has no similarity data", seed)))?;
    let diagonal = matrix.values().diag();
    let seed_is_degenerate = matrix.is_degenerate(seed);

    let mut candidates: Vec<(i64, f64)> = matrix
        .item_ids()
        .iter()
        .copied()
        .zip(row.iter().copied())
        .zip(diagonal.iter())
        .filter(|((item_id, _), self_similarity)| {
            *item_id != seed && (seed_is_degenerate || **self_similarity != 0.0)
        })
        .map(|(candidate, _)| candidate)
        .collect();

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    candidates.truncate(k);

    Ok(candidates)
}

/// Highest-rated items that clear both popularity thresholds
///
/// Means are rounded to one decimal before filtering and sorting. Both
/// thresholds are strict: an item needs a rounded mean above
/// `min_avg_rating` and more than `min_rating_count` ratings. Ties fall back
/// to the larger rating count, then ascending item id.
pub fn top_k_popular(
    stats: &[RatingStats],
    k: usize,
    min_avg_rating: f64,
    min_rating_count: usize,
) -> AppResult<Vec<RatingStats>> {
    if k == 0 {
        return Err(AppError::InvalidInput("k must be at least 1".to_string()));
    }

    let mut popular: Vec<RatingStats> = stats
        .iter()
        .filter(|s| s.rounded_mean() > min_avg_rating && s.rating_count > min_rating_count)
        .copied()
        .collect();

    popular.sort_by(|a, b| {
        b.rounded_mean()
            .total_cmp(&a.rounded_mean())
            .then_with(|| b.rating_count.cmp(&a.rating_count))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    popular.truncate(k);

    Ok(popular)
}
