use std::sync::Arc;

use crate::core::config::{AppPaths, Settings};
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::rag::{
    AnswerGenerator, ConfidenceGate, ContactInfo, HandoffDecider, RagPipeline, Retriever,
    SqliteIndex, VectorIndex,
};

pub mod error;

use error::InitializationError;

/// Global application state shared across all query-handling tasks.
///
/// Everything here is loaded once at startup and read-only afterwards, so
/// concurrent queries need no locking.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub provider: Arc<dyn LlmProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub pipeline: RagPipeline,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// Fails fast when the vector index is missing or empty: the pipeline
    /// must not accept queries it can only answer with handoffs.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let settings = Settings::load(&paths).map_err(InitializationError::Config)?;

        let index_path = settings.resolved_index_path(&paths);
        if !index_path.exists() {
            return Err(InitializationError::IndexUnavailable(index_path));
        }

        let index: Arc<dyn VectorIndex> = Arc::new(
            SqliteIndex::open(index_path.clone())
                .await
                .map_err(|e| InitializationError::Index(e.into()))?,
        );

        let chunk_count = index
            .count()
            .await
            .map_err(|e| InitializationError::Index(e.into()))?;
        if chunk_count == 0 {
            return Err(InitializationError::EmptyIndex(index_path));
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::new(
            settings.base_url.clone(),
            settings.resolved_api_key(),
        ));

        let pipeline = build_pipeline(&settings, provider.clone(), index.clone());

        tracing::info!(chunks = chunk_count, "vector index loaded");

        Ok(Arc::new(AppState {
            paths,
            settings,
            provider,
            index,
            pipeline,
        }))
    }
}

fn build_pipeline(
    settings: &Settings,
    provider: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
) -> RagPipeline {
    let retriever = Retriever::new(provider.clone(), index, settings.embedding_model.clone());
    let gate = ConfidenceGate::new(settings.confidence_threshold, settings.min_passage_score);
    let generator = AnswerGenerator::new(
        provider,
        settings.chat_model.clone(),
        settings.default_temperature,
        settings.default_max_tokens,
        settings.generation_timeout(),
    );
    let decider = HandoffDecider::new(ContactInfo {
        email: settings.contact_email.clone(),
        phone: settings.contact_phone.clone(),
        url: settings.contact_url.clone(),
    });

    RagPipeline::new(retriever, gate, generator, decider, settings.default_k)
}
