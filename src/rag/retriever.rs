//! Query-time retrieval: encode the query, ask the index for the nearest
//! chunks, normalize scores.

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use crate::rag::index::{DocumentChunk, VectorIndex};

/// A chunk retrieved for one query, score normalized into [0,1].
/// Ephemeral: consumed by the confidence gate and the generator, then
/// discarded.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub chunk: DocumentChunk,
    pub score: f32,
}

pub struct Retriever {
    provider: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
    embedding_model: String,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
        embedding_model: String,
    ) -> Self {
        Self {
            provider,
            index,
            embedding_model,
        }
    }

    /// Top-k passages for `query`, descending score, at most `k` long.
    ///
    /// An embedding failure is fatal for the query and propagates; the
    /// orchestrator converts it into a forced handoff.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, ApiError> {
        let embeddings = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await
            .map_err(|e| ApiError::Internal(format!("query encoding failed: {e}")))?;

        let query_embedding = embeddings.into_iter().next().ok_or_else(|| {
            ApiError::Internal("embedding provider returned no vector".to_string())
        })?;

        let hits = self.index.search(&query_embedding, k).await?;

        // The index's raw similarity is treated as opaque; clamp into [0,1]
        // before anything compares it to a threshold. Negative cosine reads
        // as irrelevant.
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedPassage {
                score: hit.score.clamp(0.0, 1.0),
                chunk: hit.chunk,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::ScoredChunk;
    use async_trait::async_trait;

    struct FixedIndex {
        hits: Vec<(String, f32)>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn search(&self, _q: &[f32], k: usize) -> Result<Vec<ScoredChunk>, ApiError> {
            Ok(self
                .hits
                .iter()
                .take(k)
                .map(|(id, score)| ScoredChunk {
                    chunk: DocumentChunk {
                        chunk_id: id.clone(),
                        content: "texto".to_string(),
                        product: "p".to_string(),
                    },
                    score: *score,
                })
                .collect())
        }

        async fn count(&self) -> Result<usize, ApiError> {
            Ok(self.hits.len())
        }

        async fn insert_batch(
            &self,
            _items: Vec<(DocumentChunk, Vec<f32>)>,
        ) -> Result<(), ApiError> {
            unimplemented!("read-only test index")
        }

        async fn clear(&self) -> Result<usize, ApiError> {
            unimplemented!("read-only test index")
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl LlmProvider for FixedEmbedder {
        fn name(&self) -> &str {
            "stub"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(
            &self,
            _request: crate::llm::ChatRequest,
            _model_id: &str,
        ) -> Result<String, ApiError> {
            unimplemented!("retriever never chats")
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn scores_are_clamped_into_unit_range() {
        let retriever = Retriever::new(
            Arc::new(FixedEmbedder),
            Arc::new(FixedIndex {
                hits: vec![
                    ("a".to_string(), 1.7),
                    ("b".to_string(), 0.5),
                    ("c".to_string(), -0.3),
                ],
            }),
            "embed".to_string(),
        );

        let passages = retriever.retrieve("consulta", 3).await.unwrap();
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0].score, 1.0);
        assert_eq!(passages[1].score, 0.5);
        assert_eq!(passages[2].score, 0.0);
    }

    #[tokio::test]
    async fn respects_k() {
        let retriever = Retriever::new(
            Arc::new(FixedEmbedder),
            Arc::new(FixedIndex {
                hits: vec![("a".to_string(), 0.9), ("b".to_string(), 0.8)],
            }),
            "embed".to_string(),
        );

        let passages = retriever.retrieve("consulta", 1).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].chunk.chunk_id, "a");
    }
}
