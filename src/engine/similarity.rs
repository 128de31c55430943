use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::HashMap;

use crate::{
    engine::{normalize::min_max_scale_columns, utility::UtilityMatrix},
    error::{AppError, AppResult},
};

/// Symmetric item × item cosine similarity table
///
/// Row and column `i` both belong to `item_ids[i]`. The diagonal is 1.0 for
/// every item with rating signal and 0.0 for items whose normalized column is
/// all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    item_ids: Vec<i64>,
    item_index: HashMap<i64, usize>,
    values: Array2<f64>,
}

impl SimilarityMatrix {
    /// Normalizes the utility matrix and computes cosine similarity between
    /// every pair of item columns
    pub fn compute(utility: &UtilityMatrix) -> Self {
        let scaled = min_max_scale_columns(utility.values());
        let values = cosine_similarity(&scaled);

        tracing::info!(
            items = utility.item_ids().len(),
            users = utility.user_ids().len(),
            "Computed item similarity matrix"
        );

        Self::new_unchecked(utility.item_ids().to_vec(), values)
    }

    /// Rebuilds a matrix from persisted parts, rejecting anything malformed
    pub fn from_parts(item_ids: Vec<i64>, values: Array2<f64>) -> AppResult<Self> {
        let n = item_ids.len();
        if values.dim() != (n, n) {
            return Err(AppError::CacheCorrupt(format!(
                "expected {n}x{n} values, found {:?}",
                values.dim()
            )));
        }

        let matrix = Self::new_unchecked(item_ids, values);
        if matrix.item_index.len() != n {
            return Err(AppError::CacheCorrupt("duplicate item ids".to_string()));
        }
        if matrix.values.iter().any(|v| !v.is_finite()) {
            return Err(AppError::CacheCorrupt("non-finite similarity".to_string()));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if matrix.values[[i, j]] != matrix.values[[j, i]] {
                    return Err(AppError::CacheCorrupt(format!(
                        "asymmetric entry between items {} and {}",
                        matrix.item_ids[i], matrix.item_ids[j]
                    )));
                }
            }
        }

        Ok(matrix)
    }

    fn new_unchecked(item_ids: Vec<i64>, values: Array2<f64>) -> Self {
        let item_index = item_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self {
            item_ids,
            item_index,
            values,
        }
    }

    pub fn item_ids(&self) -> &[i64] {
        &self.item_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn contains(&self, item_id: i64) -> bool {
        self.item_index.contains_key(&item_id)
    }

    /// True for an item whose normalized ratings carry no signal, marked by a
    /// zero diagonal
    pub fn is_degenerate(&self, item_id: i64) -> bool {
        self.item_index
            .get(&item_id)
            .is_some_and(|&i| self.values[[i, i]] == 0.0)
    }

    /// Similarity row of one item, aligned with `item_ids`
    pub fn row(&self, item_id: i64) -> Option<ArrayView1<'_, f64>> {
        let index = *self.item_index.get(&item_id)?;
        Some(self.values.row(index))
    }

    /// Direct pairwise lookup
    pub fn similarity(&self, a: i64, b: i64) -> AppResult<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Ok(self.values[[i, j]])
    }

    fn index_of(&self, item_id: i64) -> AppResult<usize> {
        self.item_index.get(&item_id).copied().ok_or_else(|| {
            AppError::NotFound(format!("Movie {} has no similarity data", item_id))
        })
    }

    /// True when both matrices cover the same items and every entry agrees
    /// within `tolerance`
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.item_ids == other.item_ids
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Cosine similarity between the columns of `x`
///
/// Uses a single Gram product `xᵀx` and scales it by the outer product of
/// inverse column norms. Zero-norm columns get an inverse norm of 0, so they
/// score 0.0 against everything, themselves included.
pub fn cosine_similarity(x: &Array2<f64>) -> Array2<f64> {
    let gram = x.t().dot(x);
    let n = gram.nrows();

    let norms: Array1<f64> = gram.diag().mapv(f64::sqrt);
    let inverse: Array1<f64> = norms.mapv(|norm| if norm > 0.0 { 1.0 / norm } else { 0.0 });

    let column = inverse.view().insert_axis(Axis(1));
    let row = inverse.view().insert_axis(Axis(0));
    let mut sim = &gram * &column * &row;

    for i in 0..n {
        sim[[i, i]] = if norms[i] > 0.0 { 1.0 } else { 0.0 };
        for j in (i + 1)..n {
            let value = sim[[i, j]];
            let value = if value.is_finite() {
                value.clamp(-1.0, 1.0)
            } else {
                0.0
            };
            sim[[i, j]] = value;
            sim[[j, i]] = value;
        }
    }

    sim
}
