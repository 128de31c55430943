use serde::{Deserialize, Serialize};

/// A single observed rating from the ratings table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: i64,
    pub item_id: i64,
    pub rating: f64,
    /// Seconds since the epoch, when the source table carries one
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Rating {
    pub fn new(user_id: i64, item_id: i64, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
            timestamp: None,
        }
    }
}

/// How repeated ratings for the same (user, item) pair collapse into one
/// utility matrix cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Average every rating the user gave the item
    #[default]
    #[serde(rename = "mean")]
    Mean,
    /// Keep the rating that appears last in table order
    #[serde(rename = "last")]
    LastWriteWins,
}

/// Aggregate rating statistics for one item, over every raw rating row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub item_id: i64,
    pub mean_rating: f64,
    pub rating_count: usize,
}

impl RatingStats {
    /// Mean rounded to one decimal place, the precision popularity ranks on
    ///
    /// Halfway cases go to the even digit, so 3.25 becomes 3.2.
    pub fn rounded_mean(&self) -> f64 {
        (self.mean_rating * 10.0).round_ties_even() / 10.0
    }
}
