use serde::{Deserialize, Serialize};

pub mod movie;
pub mod rating;

pub use movie::{Movie, MovieLink};
pub use rating::{DuplicatePolicy, Rating, RatingStats};

// ============================================================================
// API Response Types
// ============================================================================

/// A recommended movie together with its similarity to the seed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMovie {
    pub item_id: i64,
    pub title: String,
    pub score: f64,
}

/// Response for the seed-item recommendation view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarMoviesResponse {
    pub seed: Movie,
    pub recommendations: Vec<ScoredMovie>,
}

/// A movie that passed the popularity thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularMovie {
    pub item_id: i64,
    pub title: String,
    /// Mean rating rounded to one decimal
    pub mean_rating: f64,
    pub rating_count: usize,
}

/// Catalog entry plus its aggregate rating statistics, if it was ever rated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: Movie,
    pub stats: Option<RatingStats>,
}

/// Direct similarity lookup between two movies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityResponse {
    pub a: i64,
    pub b: i64,
    pub similarity: f64,
}
