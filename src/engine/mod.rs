//! Item-item collaborative filtering.
//!
//! Ratings are pivoted into a dense [`UtilityMatrix`], each item column is
//! min-max scaled, and cosine similarity between the scaled columns yields a
//! [`SimilarityMatrix`] that the [`ranker`] queries.

pub mod normalize;
pub mod ranker;
pub mod similarity;
pub mod utility;

pub use normalize::min_max_scale_columns;
pub use ranker::{top_k_popular, top_k_similar};
pub use similarity::{cosine_similarity, SimilarityMatrix};
pub use utility::UtilityMatrix;
