//! SQLite-backed vector index.
//!
//! The index is built offline by `build-index` and is read-only at query
//! time: brute-force cosine similarity over f32 little-endian embedding
//! blobs, which is plenty for a catalog-sized corpus.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

/// One indexed slice of a source document. Immutable after indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk identifier.
    pub chunk_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Product the source document describes.
    pub product: String,
}

/// Result of a similarity search. Score semantics are the index's own
/// (cosine here); callers normalize before comparing against thresholds.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Abstract interface over the vector index so the pipeline can be tested
/// against scripted passages.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-k chunks by similarity, descending; equal scores ordered by
    /// ascending chunk id.
    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, ApiError>;

    /// Total number of indexed chunks.
    async fn count(&self) -> Result<usize, ApiError>;

    /// Insert chunks with their embeddings. Offline build path only.
    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Drop all chunks. Used by the builder before a full rebuild.
    async fn clear(&self) -> Result<usize, ApiError>;
}

pub struct SqliteIndex {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteIndex {
    /// Opens an existing index. The file must already exist; emptiness is
    /// the caller's startup check (`count`).
    pub async fn open(db_path: PathBuf) -> Result<Self, ApiError> {
        if !db_path.exists() {
            return Err(ApiError::ServiceUnavailable);
        }
        Self::connect(db_path, false).await
    }

    /// Opens or creates the index file. Used by the offline builder and
    /// tests.
    pub async fn create(db_path: PathBuf) -> Result<Self, ApiError> {
        Self::connect(db_path, true).await
    }

    async fn connect(db_path: PathBuf, create_if_missing: bool) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let index = Self { pool, db_path };
        index.init_schema().await?;
        Ok(index)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                product TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_product ON chunks(product)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> DocumentChunk {
        DocumentChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            product: row.get("product"),
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, ApiError> {
        let rows = sqlx::query("SELECT chunk_id, content, product, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored);

                Some(ScoredChunk {
                    chunk: Self::row_to_chunk(row),
                    score,
                })
            })
            .collect();

        // Descending score; ascending chunk id on ties keeps results
        // deterministic across runs.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO chunks (chunk_id, content, product, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.product)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM chunks")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_index() -> SqliteIndex {
        let tmp = std::env::temp_dir().join(format!("vetassist-index-{}.db", uuid::Uuid::new_v4()));
        SqliteIndex::create(tmp).await.unwrap()
    }

    fn make_chunk(id: &str, content: &str, product: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            product: product.to_string(),
        }
    }

    #[tokio::test]
    async fn open_fails_for_missing_file() {
        let missing = std::env::temp_dir().join(format!("no-such-{}.db", uuid::Uuid::new_v4()));
        let result = SqliteIndex::open(missing).await;
        assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn insert_and_search() {
        let index = test_index().await;

        index
            .insert_batch(vec![
                (make_chunk("c1", "Antiparasitario bovino", "Biomec Plus"), vec![1.0, 0.0, 0.0]),
                (make_chunk("c2", "Analgésico equino", "Flunifield"), vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 2);

        let results = index.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, "c1");
        assert!(results[0].score > 0.99);
        assert!(results[1].score < 0.01);
    }

    #[tokio::test]
    async fn search_returns_at_most_k() {
        let index = test_index().await;

        let items: Vec<_> = (0..5)
            .map(|i| (make_chunk(&format!("c{i}"), "texto", "p"), vec![1.0, 0.0]))
            .collect();
        index.insert_batch(items).await.unwrap();

        let results = index.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn search_with_k_zero_returns_nothing() {
        let index = test_index().await;

        index
            .insert_batch(vec![(make_chunk("c1", "texto", "p"), vec![1.0, 0.0])])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 0).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn ties_break_by_ascending_chunk_id() {
        let index = test_index().await;

        // Identical embeddings, identical scores.
        index
            .insert_batch(vec![
                (make_chunk("b", "dos", "p"), vec![1.0, 0.0]),
                (make_chunk("a", "uno", "p"), vec![1.0, 0.0]),
                (make_chunk("c", "tres", "p"), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn clear_empties_the_index() {
        let index = test_index().await;

        index
            .insert_batch(vec![(make_chunk("c1", "texto", "p"), vec![1.0])])
            .await
            .unwrap();

        assert_eq!(index.clear().await.unwrap(), 1);
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
