use ndarray::Array2;
use std::collections::{BTreeSet, HashMap};

use crate::models::{DuplicatePolicy, Rating};

/// Dense user × item rating table, 0.0 where a user never rated an item
///
/// Rows follow `user_ids` and columns follow `item_ids`, both ascending.
/// Only items that received at least one rating get a column.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityMatrix {
    user_ids: Vec<i64>,
    item_ids: Vec<i64>,
    item_index: HashMap<i64, usize>,
    values: Array2<f64>,
}

impl UtilityMatrix {
    /// Pivots rating triples into a dense matrix
    pub fn build(ratings: &[Rating], policy: DuplicatePolicy) -> Self {
        let user_ids: Vec<i64> = ratings
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let item_ids: Vec<i64> = ratings
            .iter()
            .map(|r| r.item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_index: HashMap<i64, usize> =
            user_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let item_index: HashMap<i64, usize> =
            item_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut values = Array2::<f64>::zeros((user_ids.len(), item_ids.len()));

        match policy {
            DuplicatePolicy::LastWriteWins => {
                for r in ratings {
                    values[[user_index[&r.user_id], item_index[&r.item_id]]] = r.rating;
                }
            }
            DuplicatePolicy::Mean => {
                let mut cells: HashMap<(usize, usize), (f64, u32)> = HashMap::new();
                for r in ratings {
                    let cell = cells
                        .entry((user_index[&r.user_id], item_index[&r.item_id]))
                        .or_insert((0.0, 0));
                    cell.0 += r.rating;
                    cell.1 += 1;
                }
                for ((row, col), (sum, count)) in cells {
                    values[[row, col]] = sum / count as f64;
                }
            }
        }

        tracing::debug!(
            users = user_ids.len(),
            items = item_ids.len(),
            ?policy,
            "Built utility matrix"
        );

        Self {
            user_ids,
            item_ids,
            item_index,
            values,
        }
    }

    pub fn user_ids(&self) -> &[i64] {
        &self.user_ids
    }

    pub fn item_ids(&self) -> &[i64] {
        &self.item_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rating cell for a (user, item) pair, `None` if either id has no row/column
    pub fn get(&self, user_id: i64, item_id: i64) -> Option<f64> {
        let row = self.user_ids.binary_search(&user_id).ok()?;
        let col = *self.item_index.get(&item_id)?;
        Some(self.values[[row, col]])
    }

    /// Stable content hash used to version persisted similarity snapshots
    ///
    /// Covers both id axes and every cell bit pattern, so any change to the
    /// ratings that reaches the matrix changes the fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.user_ids.len() as u64).to_le_bytes());
        hasher.update(&(self.item_ids.len() as u64).to_le_bytes());
        for id in self.user_ids.iter().chain(self.item_ids.iter()) {
            hasher.update(&id.to_le_bytes());
        }
        for value in self.values.iter() {
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
