use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    engine::SimilarityMatrix,
    error::{AppError, AppResult},
};

/// Persistence for computed similarity matrices
///
/// Snapshots are keyed by the fingerprint of the utility matrix they were
/// computed from. A snapshot stored under a different fingerprint is a miss,
/// never a hit. Unreadable snapshots surface as [`AppError::CacheCorrupt`] so
/// the caller can rebuild.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SimilarityCache: Send + Sync {
    /// Returns the snapshot stored for `fingerprint`, if any
    async fn load(&self, fingerprint: &str) -> AppResult<Option<SimilarityMatrix>>;

    /// Persists `matrix` as the snapshot for `fingerprint`, replacing any other
    async fn store(&self, fingerprint: &str, matrix: &SimilarityMatrix) -> AppResult<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Self-describing form of a similarity matrix for serialized backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilaritySnapshot {
    pub fingerprint: String,
    pub item_ids: Vec<i64>,
    /// Row-major `item_ids.len()²` values
    pub values: Vec<f64>,
    pub built_at: DateTime<Utc>,
}

impl SimilaritySnapshot {
    pub fn from_matrix(fingerprint: &str, matrix: &SimilarityMatrix) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            item_ids: matrix.item_ids().to_vec(),
            values: matrix.values().iter().copied().collect(),
            built_at: Utc::now(),
        }
    }

    pub fn into_matrix(self) -> AppResult<SimilarityMatrix> {
        let n = self.item_ids.len();
        let values = Array2::from_shape_vec((n, n), self.values)
            .map_err(|e| AppError::CacheCorrupt(format!("bad snapshot shape: {}", e)))?;
        SimilarityMatrix::from_parts(self.item_ids, values)
    }
}
