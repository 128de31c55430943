use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{
    db::cache::SimilarityCache,
    engine::SimilarityMatrix,
    error::{AppError, AppResult},
};

/// Header of the id column in the similarity table
const ID_COLUMN: &str = "movieId";

/// Sidecar describing which dataset a table on disk was computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotMeta {
    fingerprint: String,
    items: usize,
    built_at: DateTime<Utc>,
}

/// Similarity cache backed by a delimited text table on disk
///
/// The table has a header row `movieId,<id>,<id>,…` and one row per item,
/// the layout a dataframe `to_csv` would produce. A JSON sidecar next to it
/// (`<path>.meta.json`) records the dataset fingerprint.
#[derive(Debug, Clone)]
pub struct FileSimilarityCache {
    path: PathBuf,
    meta_path: PathBuf,
}

impl FileSimilarityCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut meta_path = path.clone().into_os_string();
        meta_path.push(".meta.json");
        Self {
            path,
            meta_path: PathBuf::from(meta_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_meta(&self) -> AppResult<Option<SnapshotMeta>> {
        match tokio::fs::read(&self.meta_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::CacheCorrupt(format!("unreadable metadata: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl SimilarityCache for FileSimilarityCache {
    async fn load(&self, fingerprint: &str) -> AppResult<Option<SimilarityMatrix>> {
        let Some(meta) = self.read_meta().await? else {
            tracing::debug!(path = %self.path.display(), "No similarity snapshot metadata");
            return Ok(None);
        };

        if meta.fingerprint != fingerprint {
            tracing::info!(
                path = %self.path.display(),
                cached = %meta.fingerprint,
                current = %fingerprint,
                "Similarity snapshot belongs to a different dataset"
            );
            return Ok(None);
        }

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::CacheCorrupt(
                    "metadata present but table missing".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let matrix = parse_table(&bytes)?;
        if matrix.len() != meta.items {
            return Err(AppError::CacheCorrupt(format!(
                "metadata lists {} items, table has {}",
                meta.items,
                matrix.len()
            )));
        }

        tracing::info!(
            path = %self.path.display(),
            items = matrix.len(),
            built_at = %meta.built_at,
            "Loaded similarity snapshot"
        );

        Ok(Some(matrix))
    }

    async fn store(&self, fingerprint: &str, matrix: &SimilarityMatrix) -> AppResult<()> {
        // Drop the old metadata first so a crash mid-write leaves a miss
        match tokio::fs::remove_file(&self.meta_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, render_table(matrix)?).await?;

        let meta = SnapshotMeta {
            fingerprint: fingerprint.to_string(),
            items: matrix.len(),
            built_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| AppError::Internal(format!("Metadata serialization error: {}", e)))?;
        tokio::fs::write(&self.meta_path, json).await?;

        tracing::info!(
            path = %self.path.display(),
            items = matrix.len(),
            "Stored similarity snapshot"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Writes the matrix as a delimited table keyed by item id on both axes
fn render_table(matrix: &SimilarityMatrix) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(matrix.len() + 1);
    header.push(ID_COLUMN.to_string());
    header.extend(matrix.item_ids().iter().map(|id| id.to_string()));
    writer.write_record(&header)?;

    for (item_id, row) in matrix.item_ids().iter().zip(matrix.values().rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(item_id.to_string());
        // `Display` for f64 is the shortest exact representation, so values
        // read back bit-for-bit
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Similarity table write error: {}", e)))
}

fn parse_table(bytes: &[u8]) -> AppResult<SimilarityMatrix> {
    let corrupt = |msg: String| AppError::CacheCorrupt(msg);

    let mut reader = csv::Reader::from_reader(bytes);
    let header = reader
        .headers()
        .map_err(|e| corrupt(format!("unreadable header: {}", e)))?
        .clone();

    if header.get(0) != Some(ID_COLUMN) {
        return Err(corrupt(format!("first column must be {}", ID_COLUMN)));
    }

    let item_ids = header
        .iter()
        .skip(1)
        .map(|field| {
            field
                .parse::<i64>()
                .map_err(|_| corrupt(format!("bad item id {:?} in header", field)))
        })
        .collect::<AppResult<Vec<i64>>>()?;

    let n = item_ids.len();
    let mut values = Array2::<f64>::zeros((n, n));
    let mut rows = 0usize;

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| corrupt(format!("unreadable row {}: {}", i + 1, e)))?;
        if i >= n {
            return Err(corrupt(format!("more than {} rows", n)));
        }

        let row_id: i64 = record
            .get(0)
            .and_then(|field| field.parse().ok())
            .ok_or_else(|| corrupt(format!("bad item id in row {}", i + 1)))?;
        if row_id != item_ids[i] {
            return Err(corrupt(format!(
                "row {} is item {}, header expects {}",
                i + 1,
                row_id,
                item_ids[i]
            )));
        }

        for (j, field) in record.iter().skip(1).enumerate() {
            values[[i, j]] = field
                .parse()
                .map_err(|_| corrupt(format!("bad value {:?} for item {}", field, row_id)))?;
        }
        rows += 1;
    }

    if rows != n {
        return Err(corrupt(format!("expected {} rows, found {}", n, rows)));
    }

    SimilarityMatrix::from_parts(item_ids, values)
}
