//! Answer generation over retrieved passages.
//!
//! Failures are values, not exceptions: the pipeline branches on
//! `GenerationResult`, never on a propagated error, and a single failure
//! routes to handoff without retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::rag::retriever::RetrievedPassage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationFailure {
    Network,
    Timeout,
    EmptyCompletion,
    ProviderError,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub answer_text: String,
    pub model: String,
    pub succeeded: bool,
    pub failure_reason: Option<GenerationFailure>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationResult {
    fn success(answer_text: String, model: &str) -> Self {
        Self {
            answer_text,
            model: model.to_string(),
            succeeded: true,
            failure_reason: None,
            timestamp: Utc::now(),
        }
    }

    fn failure(reason: GenerationFailure, model: &str) -> Self {
        Self {
            answer_text: String::new(),
            model: model.to_string(),
            succeeded: false,
            failure_reason: Some(reason),
            timestamp: Utc::now(),
        }
    }
}

const SYSTEM_PROMPT: &str =
    "Sos un asistente técnico veterinario del laboratorio. Respondés únicamente \
     en base a los documentos de referencia provistos.";

pub struct AnswerGenerator {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        chat_model: String,
        temperature: f64,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            chat_model,
            temperature,
            max_tokens,
            timeout,
        }
    }

    /// Compose the prompt and invoke the model. Only called when the
    /// confidence gate reported a sufficient passage set.
    pub async fn generate(&self, query: &str, passages: &[RetrievedPassage]) -> GenerationResult {
        let prompt = build_prompt(query, passages);
        let request = ChatRequest {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        let call = self.provider.chat(request, &self.chat_model);
        let outcome = tokio::time::timeout(self.timeout, call).await;

        match outcome {
            Err(_) => {
                tracing::warn!(model = %self.chat_model, "generation timed out");
                GenerationResult::failure(GenerationFailure::Timeout, &self.chat_model)
            }
            Ok(Err(err)) => {
                let reason = match err {
                    ApiError::UpstreamUnreachable(_) => GenerationFailure::Network,
                    _ => GenerationFailure::ProviderError,
                };
                tracing::warn!(model = %self.chat_model, error = %err, "generation failed");
                GenerationResult::failure(reason, &self.chat_model)
            }
            Ok(Ok(completion)) => {
                let answer = completion.trim().to_string();
                if answer.is_empty() {
                    GenerationResult::failure(GenerationFailure::EmptyCompletion, &self.chat_model)
                } else {
                    GenerationResult::success(answer, &self.chat_model)
                }
            }
        }
    }
}

/// Embed the query and the passages into a single user prompt, each passage
/// tagged with its source product so the model can attribute claims. The
/// prompt is the only grounding guardrail the pipeline provides.
fn build_prompt(query: &str, passages: &[RetrievedPassage]) -> String {
    let context = passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "Documento {} (producto: {}):\n{}",
                i + 1,
                p.chunk.product,
                p.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "DOCUMENTOS DE REFERENCIA:\n{context}\n\n\
         PREGUNTA DEL USUARIO:\n{query}\n\n\
         INSTRUCCIONES:\n\
         1. Analizá la pregunta e identificá qué necesita el usuario\n\
         2. Buscá en los documentos productos que puedan ayudar\n\
         3. Si encontrás productos relevantes, explicá nombre, uso, \
         dosificación, vía de administración y contraindicaciones\n\
         4. No inventes información que no esté en los documentos\n\
         5. Sé específico y profesional\n\n\
         RESPUESTA:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::DocumentChunk;

    fn passage(product: &str, content: &str) -> RetrievedPassage {
        RetrievedPassage {
            chunk: DocumentChunk {
                chunk_id: "c1".to_string(),
                content: content.to_string(),
                product: product.to_string(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn prompt_tags_each_passage_with_its_product() {
        let passages = vec![
            passage("Biomec Plus", "Ivermectina al 1%."),
            passage("Flunifield", "Antiinflamatorio no esteroide."),
        ];

        let prompt = build_prompt("¿Qué sirve para parásitos?", &passages);

        assert!(prompt.contains("producto: Biomec Plus"));
        assert!(prompt.contains("producto: Flunifield"));
        assert!(prompt.contains("¿Qué sirve para parásitos?"));
        assert!(prompt.contains("\n\n---\n\n"));
    }

    #[test]
    fn prompt_keeps_passage_order() {
        let passages = vec![passage("Primero", "uno"), passage("Segundo", "dos")];
        let prompt = build_prompt("consulta", &passages);

        let first = prompt.find("Primero").unwrap();
        let second = prompt.find("Segundo").unwrap();
        assert!(first < second);
    }
}
