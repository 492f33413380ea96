//! Retrieval-augmented answer pipeline with confidence-gated human handoff.

pub mod chunker;
pub mod confidence;
pub mod generator;
pub mod handoff;
pub mod index;
pub mod pipeline;
pub mod retriever;


pub use chunker::{Chunker, ChunkerConfig};
pub use confidence::{ConfidenceAssessment, ConfidenceGate};
pub use generator::{AnswerGenerator, GenerationFailure, GenerationResult};
pub use handoff::{ContactInfo, DeciderState, HandoffDecider, HandoffReason};
pub use index::{DocumentChunk, ScoredChunk, SqliteIndex, VectorIndex};
pub use pipeline::{ChatResponse, RagPipeline};
pub use retriever::{RetrievedPassage, Retriever};
