//! Pipeline orchestrator: retrieval → confidence gate → decider (which
//! invokes generation as needed) → response assembly.
//!
//! "Ask a human" is the universal fallback value here, not an error: the
//! only failure that crosses this boundary is an empty query. Everything
//! else becomes a normal response with `needs_human = true`.

use serde::Serialize;

use crate::core::errors::ApiError;
use crate::rag::confidence::ConfidenceGate;
use crate::rag::generator::AnswerGenerator;
use crate::rag::handoff::{DeciderState, HandoffDecider};
use crate::rag::retriever::Retriever;

/// The externally visible result of one query. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub needs_human: bool,
    pub num_docs: usize,
    pub session_id: String,
}

pub struct RagPipeline {
    retriever: Retriever,
    gate: ConfidenceGate,
    generator: AnswerGenerator,
    decider: HandoffDecider,
    default_k: usize,
}

impl RagPipeline {
    pub fn new(
        retriever: Retriever,
        gate: ConfidenceGate,
        generator: AnswerGenerator,
        decider: HandoffDecider,
        default_k: usize,
    ) -> Self {
        Self {
            retriever,
            gate,
            generator,
            decider,
            default_k,
        }
    }

    /// Answer one query. `session_id` is pass-through correlation metadata;
    /// the pipeline never interprets it.
    pub async fn answer_query(
        &self,
        query: &str,
        session_id: String,
        k: Option<usize>,
    ) -> Result<ChatResponse, ApiError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }

        let k = k.unwrap_or(self.default_k);

        let (state, num_docs) = match self.run(trimmed, k).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "pipeline stage failed; forcing handoff");
                (self.decider.fault(), 0)
            }
        };

        // Anything short of a clean answer resolves as a handoff; no error
        // besides the empty-query rejection crosses this boundary.
        let (answer, needs_human) = match state {
            DeciderState::Answered { answer } => (answer, false),
            DeciderState::Handoff { answer, .. } => (answer, true),
            DeciderState::EvaluatingRetrieval | DeciderState::Generating => {
                tracing::error!("routing ended in a non-terminal state; forcing handoff");
                (self.decider.fault_answer(), true)
            }
        };

        Ok(ChatResponse {
            answer,
            needs_human,
            num_docs,
            session_id,
        })
    }

    async fn run(&self, query: &str, k: usize) -> Result<(DeciderState, usize), ApiError> {
        let passages = self.retriever.retrieve(query, k).await?;
        let num_docs = passages.len();

        let assessment = self.gate.assess(&passages);
        tracing::debug!(
            mean_score = assessment.mean_score,
            passage_count = assessment.passage_count,
            sufficient = assessment.sufficient,
            "retrieval assessed"
        );

        let state = match self.decider.evaluate_retrieval(&assessment) {
            DeciderState::Generating => {
                let result = self.generator.generate(query, &passages).await;
                self.decider.evaluate_generation(&result)
            }
            terminal => terminal,
        };

        Ok((state, num_docs))
    }
}
